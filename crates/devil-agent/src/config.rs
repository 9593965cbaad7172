//! Agent configuration.
//!
//! Defaults live in constants; `AgentConfig::from_env` overlays `.env` and
//! process environment variables, and the binary overlays CLI flags on top.

use anyhow::{bail, Context, Result};
use rig::providers::openai;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model for both extraction and generation.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Hard ceiling on retrieve-validate rounds per turn.
pub const DEFAULT_MAX_SEARCH_ITERATIONS: usize = 3;
/// Hits requested per search query.
pub const DEFAULT_SEARCH_RESULTS: usize = 5;
/// HTTP timeout for one search request.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;

/// Top-level agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model name sent in every completion request.
    pub model: String,
    /// Bearer key (`not-needed` for local servers that ignore it).
    pub api_key: String,
    /// OpenAI-compatible base URL, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    /// Directory scanned for `<name>/SKILL.md` at startup.
    pub skills_dir: PathBuf,
    /// Result limit per search query.
    pub search_results: usize,
    /// Retrieval loop cap.
    pub max_search_iterations: usize,
    pub search_timeout: Duration,
    /// Initial toggles.
    pub devil_mode: bool,
    pub web_search: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            api_key: "not-needed".into(),
            base_url: DEFAULT_BASE_URL.into(),
            skills_dir: PathBuf::from("./skills"),
            search_results: DEFAULT_SEARCH_RESULTS,
            max_search_iterations: DEFAULT_MAX_SEARCH_ITERATIONS,
            search_timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            devil_mode: true,
            web_search: true,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl AgentConfig {
    /// Build from the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or(defaults.api_key),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            skills_dir: std::env::var("DEVIL_SKILLS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.skills_dir),
            search_results: env_or("DEVIL_SEARCH_RESULTS", defaults.search_results)?,
            max_search_iterations: env_or(
                "DEVIL_MAX_SEARCH_ITERATIONS",
                defaults.max_search_iterations,
            )?,
            search_timeout: Duration::from_secs(env_or(
                "DEVIL_SEARCH_TIMEOUT_SECS",
                DEFAULT_SEARCH_TIMEOUT_SECS,
            )?),
            devil_mode: defaults.devil_mode,
            web_search: defaults.web_search,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_search_iterations == 0 {
            bail!("max_search_iterations must be at least 1");
        }
        if self.search_results == 0 {
            bail!("search_results must be at least 1");
        }
        if self.search_timeout.is_zero() {
            bail!("search_timeout must be non-zero");
        }
        if self.model.trim().is_empty() {
            bail!("model name is empty");
        }
        Ok(())
    }

    /// Build the rig client for the configured endpoint.
    pub fn completions_client(&self) -> Result<openai::CompletionsClient> {
        openai::CompletionsClient::builder()
            .api_key(&self.api_key)
            .base_url(&self.base_url)
            .build()
            .with_context(|| format!("Failed to build completions client ({})", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_product() {
        let c = AgentConfig::default();
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.max_search_iterations, 3);
        assert_eq!(c.search_results, 5);
        assert!(c.devil_mode);
        assert!(c.web_search);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut c = AgentConfig::default();
        c.max_search_iterations = 0;
        assert!(c.validate().is_err());

        let mut c = AgentConfig::default();
        c.search_results = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn empty_model_is_rejected() {
        let c = AgentConfig {
            model: "  ".into(),
            ..AgentConfig::default()
        };
        assert!(c.validate().is_err());
    }
}
