//! `SKILL.md` frontmatter parsing.
//!
//! A skill file opens with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! name: code-checker
//! description: Reviews source code for defects
//! allowed-tools: read_file grep
//! metadata:
//!   owner: platform
//! ---
//! # Instructions
//! ...
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use super::error::{SkillError, SkillResult};
use super::SkillRecord;

/// Largest skill file accepted, in bytes.
pub const MAX_SKILL_FILE_SIZE: u64 = 10 * 1024 * 1024;
/// Descriptions longer than this (in characters) are truncated.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;
/// Longest valid skill name.
pub const MAX_NAME_LENGTH: usize = 64;

const TRUNCATION_SUFFIX: &str = "...";

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
            .expect("frontmatter regex is valid")
    })
}

fn skill_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("name regex is valid"))
}

#[derive(Debug, Deserialize)]
struct RawFrontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    compatibility: Option<String>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, rename = "allowed-tools")]
    allowed_tools: Option<String>,
}

/// Check a skill name against the naming rules.
///
/// Returns a human-readable reason on failure. Callers treat the result as
/// advisory only.
pub fn validate_skill_name(name: &str, directory_name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Skill name cannot be empty".to_string());
    }
    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(format!("Skill name too long: {len} > {MAX_NAME_LENGTH}"));
    }
    if !skill_name_re().is_match(name) {
        return Err(format!("Invalid skill name format: {name}"));
    }
    if name != directory_name {
        return Err(format!(
            "Skill name '{name}' doesn't match directory '{directory_name}'"
        ));
    }
    Ok(())
}

/// Cap a description at [`MAX_DESCRIPTION_LENGTH`] characters, appending `...`.
pub fn truncate_description(desc: &str) -> String {
    if desc.chars().count() <= MAX_DESCRIPTION_LENGTH {
        return desc.to_string();
    }
    let mut out: String = desc.chars().take(MAX_DESCRIPTION_LENGTH).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}

/// Parse the full text of a `SKILL.md` into a [`SkillRecord`].
///
/// `directory_name` is the name of the directory holding the file; a
/// mismatch with the frontmatter `name` is logged, not rejected.
pub fn parse_skill(content: &str, path: &Path, directory_name: &str) -> SkillResult<SkillRecord> {
    let size = content.len() as u64;
    if size > MAX_SKILL_FILE_SIZE {
        return Err(SkillError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: MAX_SKILL_FILE_SIZE,
        });
    }

    let block = frontmatter_re()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| SkillError::MissingFrontmatter {
            path: path.to_path_buf(),
        })?;

    let raw: RawFrontmatter =
        serde_yaml::from_str(block).map_err(|e| SkillError::InvalidYaml {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let name = raw
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| SkillError::MissingField {
            path: path.to_path_buf(),
            field: "name",
        })?;
    let description = raw
        .description
        .filter(|d| !d.is_empty())
        .ok_or_else(|| SkillError::MissingField {
            path: path.to_path_buf(),
            field: "description",
        })?;

    if let Err(reason) = validate_skill_name(&name, directory_name) {
        warn!(path = %path.display(), "Skill name warning: {reason}");
    }

    let allowed_tools = raw
        .allowed_tools
        .map(|tools| tools.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(SkillRecord {
        name,
        description: truncate_description(&description),
        source_path: path.to_path_buf(),
        content: content.to_string(),
        license: raw.license,
        compatibility: raw.compatibility,
        metadata: raw.metadata.unwrap_or_default(),
        allowed_tools,
    })
}
