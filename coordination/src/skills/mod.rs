//! Skill registry: specialised reviewer instructions loaded from disk.
//!
//! Each skill is a directory holding a `SKILL.md` with YAML frontmatter
//! (see [`frontmatter`]). The registry is built once at startup and is
//! read-only afterwards, so it can be shared across turns behind an `Arc`
//! without locking.
//!
//! Sessions refer to skills by name only; the registry is the single owner
//! of every [`SkillRecord`].

pub mod error;
pub mod frontmatter;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

pub use error::{SkillError, SkillResult};
pub use frontmatter::{
    parse_skill, truncate_description, validate_skill_name, MAX_DESCRIPTION_LENGTH,
    MAX_SKILL_FILE_SIZE,
};

/// File name looked up inside every skill directory.
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// A single loaded skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillRecord {
    /// Unique, lowercase-hyphenated name (should match the directory name).
    pub name: String,
    /// Short description, capped at [`MAX_DESCRIPTION_LENGTH`] characters plus `...`.
    pub description: String,
    /// Path of the `SKILL.md` this record was read from.
    pub source_path: PathBuf,
    /// Full instruction text (the whole file, frontmatter included).
    pub content: String,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    /// Free-form `metadata` mapping from the frontmatter.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Tokens from the whitespace-separated `allowed-tools` key.
    pub allowed_tools: Vec<String>,
}

/// Read and parse one `SKILL.md`, enforcing the size limit before reading.
pub fn load_skill_file(path: &Path, directory_name: &str) -> SkillResult<SkillRecord> {
    let meta = std::fs::metadata(path).map_err(|source| SkillError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.len() > MAX_SKILL_FILE_SIZE {
        return Err(SkillError::TooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: MAX_SKILL_FILE_SIZE,
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| SkillError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_skill(&content, path, directory_name)
}

/// Scan `source_dir` for `<name>/SKILL.md` entries.
///
/// Never fails: unreadable entries and malformed files are logged and
/// skipped. Results are ordered by directory name.
pub fn list_skills(source_dir: &Path) -> Vec<SkillRecord> {
    if !source_dir.is_dir() {
        warn!(dir = %source_dir.display(), "Skills directory not found");
        return Vec::new();
    }

    let entries = match std::fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %source_dir.display(), error = %e, "Failed to read skills directory");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(e) => Some(e.path()),
            Err(e) => {
                warn!(error = %e, "Failed to read dir entry");
                None
            }
        })
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut skills = Vec::new();
    for dir in dirs {
        let skill_md = dir.join(SKILL_FILE_NAME);
        if !skill_md.is_file() {
            continue;
        }
        let directory_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match load_skill_file(&skill_md, &directory_name) {
            Ok(skill) => skills.push(skill),
            Err(e) => warn!("Skipping skill: {e}"),
        }
    }

    let names: Vec<&str> = skills.iter().map(|s| s.name.as_str()).collect();
    info!(count = skills.len(), ?names, "Loaded skills");
    skills
}

/// Immutable, name-indexed set of skills.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: Vec<SkillRecord>,
}

impl SkillRegistry {
    pub fn new(skills: Vec<SkillRecord>) -> Self {
        Self { skills }
    }

    /// Build a registry by scanning a skills directory.
    pub fn from_dir(dir: &Path) -> Self {
        Self::new(list_skills(dir))
    }

    /// Look a skill up by exact name. First registered match wins.
    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn all(&self) -> &[SkillRecord] {
        &self.skills
    }

    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Render the name + description list injected into the review prompt.
    pub fn format_summary(&self) -> String {
        if self.skills.is_empty() {
            return "No skills available".to_string();
        }
        self.skills
            .iter()
            .map(|s| {
                format!(
                    "- **{}**: {}\n  → Read {} for full instructions",
                    s.name,
                    s.description,
                    s.source_path.display()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
