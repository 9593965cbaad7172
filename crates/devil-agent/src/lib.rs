//! Devil's-advocate review agent.
//!
//! Wraps an OpenAI-compatible model with a self-validating web search loop
//! and content-aware reviewer skills. Deterministic pieces (skills, session
//! state, search text assembly) live in the `coordination` crate; this crate
//! holds the async, network-facing parts.

pub mod agent;
pub mod config;
pub mod events;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod retrieval;
pub mod search;

pub use agent::{DevilAgent, DevilAgentBuilder};
pub use config::AgentConfig;
pub use events::{OutputEvent, STAGE_MARKER};
pub use llm::{AdapterError, Extraction, LanguageModel, OpenAiModel, TextStream};
pub use retrieval::{RetrievalLoop, RetrievalOutcome};
pub use search::{DuckDuckGoSearch, SearchError, WebSearch};
