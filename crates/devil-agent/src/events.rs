//! Events emitted by a chat turn, and their flat text rendering.
//!
//! Consumers that only handle strings get the wire form: progress lines are
//! prefixed with [`STAGE_MARKER`], everything else is response text.

use serde::{Deserialize, Serialize};

/// Prefix distinguishing progress fragments from generated content.
pub const STAGE_MARKER: &str = "[STAGE]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum OutputEvent {
    /// Stage annotation for a progress display.
    Progress(String),
    /// Generated response text, including trailing footers.
    Content(String),
    /// Terminal failure while generating; always the last event of a turn.
    Error(String),
}

impl OutputEvent {
    pub fn progress(text: impl Into<String>) -> Self {
        Self::Progress(text.into())
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }

    pub fn is_progress(&self) -> bool {
        matches!(self, Self::Progress(_))
    }

    pub fn to_wire(&self) -> String {
        match self {
            Self::Progress(text) => format!("{STAGE_MARKER}{text}\n"),
            Self::Content(text) => text.clone(),
            Self::Error(reason) => format!("\n[Error: {reason}]"),
        }
    }

    pub fn from_wire(fragment: &str) -> Self {
        if let Some(rest) = fragment.strip_prefix(STAGE_MARKER) {
            return Self::Progress(rest.strip_suffix('\n').unwrap_or(rest).to_string());
        }
        if let Some(reason) = fragment
            .strip_prefix("\n[Error: ")
            .and_then(|r| r.strip_suffix(']'))
        {
            return Self::Error(reason.to_string());
        }
        Self::Content(fragment.to_string())
    }
}

impl std::fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}
