//! Devil Agent Coordination Library
//!
//! Deterministic, LLM-free building blocks for the review agent:
//! - Skill registry: `SKILL.md` frontmatter parsing and directory scanning
//! - Skill router: ordered keyword rules mapping input to a reviewer skill
//! - Session state: mode toggles, active skill, per-turn history
//! - Search text: hit rendering, accumulated results, context assembly,
//!   citation extraction
//!
//! Everything here is synchronous and side-effect free apart from reading
//! skill files, so it can be tested without a model or network.

#![allow(clippy::uninlined_format_args)]

pub mod router;
pub mod search;
pub mod session;
pub mod skills;

// Re-export key skill types
pub use skills::{list_skills, SkillError, SkillRecord, SkillRegistry, SkillResult};

// Re-export skill routing types
pub use router::{classify, ReviewSkill};

// Re-export session types
pub use session::{Message, SessionState, StatusSnapshot, RESET_HISTORY_EACH_TURN};

// Re-export search text types
pub use search::{
    build_context, extract_sources, references_footer, render_hits, SearchHit, SearchQueries,
    SearchResultMap, SearchValidationVerdict, OFFLINE_NOTICE,
};
