//! Structured error types for skill loading.
//!
//! None of these are fatal to the registry: the directory scan logs each
//! one and skips the offending file.

use std::path::PathBuf;

/// Errors produced while reading or parsing a single `SKILL.md`.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// Failed to read the file or its metadata from disk.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File exceeds the size ceiling.
    #[error("{}: content too large ({size} bytes, limit {limit})", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// File does not open with a `---` delimited frontmatter block.
    #[error("{}: no valid YAML frontmatter", .path.display())]
    MissingFrontmatter { path: PathBuf },

    /// Frontmatter block is not valid YAML (or not a mapping).
    #[error("{}: invalid YAML: {detail}", .path.display())]
    InvalidYaml { path: PathBuf, detail: String },

    /// A required key is absent or empty.
    #[error("{}: missing required field `{field}`", .path.display())]
    MissingField { path: PathBuf, field: &'static str },
}

/// Result type alias for skill operations.
pub type SkillResult<T> = Result<T, SkillError>;
