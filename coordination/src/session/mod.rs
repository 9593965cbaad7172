//! Per-agent session state: mode toggles, active skill, and turn history.
//!
//! The session holds the active skill by *name*; the [`SkillRegistry`]
//! remains the only owner of skill records.
//!
//! History is reset at the start of every turn (see
//! [`RESET_HISTORY_EACH_TURN`]); each chat call is an independent
//! conversation and `history` is only kept for status reporting.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::router::skill_classifier;
use crate::skills::{SkillRecord, SkillRegistry};

/// Whether each chat turn starts from an empty history.
pub const RESET_HISTORY_EACH_TURN: bool = true;

/// One chat message, in chronological order within a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "snake_case")]
pub enum Message {
    System(String),
    Human(String),
    Assistant(String),
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Self::System(t) | Self::Human(t) | Self::Assistant(t) => t,
        }
    }

    /// OpenAI-style role string.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::Human(_) => "user",
            Self::Assistant(_) => "assistant",
        }
    }
}

/// Read-only view of the session, returned by every toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub devil_mode: bool,
    pub search_enabled: bool,
    pub active_skill: Option<String>,
    pub skills: Vec<String>,
    /// Number of messages currently in history.
    pub history: usize,
}

/// Mutable session state owned by one agent.
#[derive(Debug, Clone)]
pub struct SessionState {
    devil_mode: bool,
    web_search: bool,
    active_skill: Option<String>,
    history: Vec<Message>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl SessionState {
    pub fn new(devil_mode: bool, web_search: bool) -> Self {
        Self {
            devil_mode,
            web_search,
            active_skill: None,
            history: Vec::new(),
        }
    }

    pub fn devil_mode(&self) -> bool {
        self.devil_mode
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn active_skill(&self) -> Option<&str> {
        self.active_skill.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Switch between devil and normal mode. Always drops the active skill.
    pub fn set_mode(&mut self, devil: bool) {
        self.devil_mode = devil;
        self.active_skill = None;
        info!(mode = if devil { "devil" } else { "normal" }, "Mode changed");
    }

    /// Toggle web search. Skill state is untouched.
    pub fn set_search(&mut self, enabled: bool) {
        self.web_search = enabled;
        info!(web_search = enabled, "Web search toggled");
    }

    /// Drop history and the active skill.
    pub fn clear(&mut self) {
        self.history.clear();
        self.active_skill = None;
        info!("Session cleared");
    }

    /// Called at the start of each chat turn.
    pub fn begin_turn(&mut self) {
        if RESET_HISTORY_EACH_TURN {
            self.history.clear();
        }
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Resolve the skill for a devil-mode turn.
    ///
    /// Classification runs only while no skill is active and the input is
    /// non-empty; once a skill is found it sticks until [`set_mode`] or
    /// [`clear`]. Returns `None` outside devil mode or when the classified
    /// skill is not registered.
    ///
    /// [`set_mode`]: Self::set_mode
    /// [`clear`]: Self::clear
    pub fn resolve_skill<'r>(
        &mut self,
        registry: &'r SkillRegistry,
        user_input: &str,
    ) -> Option<&'r SkillRecord> {
        if !self.devil_mode {
            return None;
        }
        if self.active_skill.is_none() && !user_input.is_empty() {
            let name = skill_classifier::classify(user_input).skill_name();
            match registry.get(name) {
                Some(skill) => {
                    info!(skill = name, "Loaded skill instructions");
                    self.active_skill = Some(skill.name.clone());
                }
                None => warn!(skill = name, "Skill not found"),
            }
        }
        self.active_skill.as_deref().and_then(|name| registry.get(name))
    }

    pub fn snapshot(&self, registry: &SkillRegistry) -> StatusSnapshot {
        StatusSnapshot {
            devil_mode: self.devil_mode,
            search_enabled: self.web_search,
            active_skill: self.active_skill.clone(),
            skills: registry.names(),
            history: self.history.len(),
        }
    }
}
