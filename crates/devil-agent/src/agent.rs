//! Conversation orchestrator.
//!
//! One [`DevilAgent`] owns one session. A chat turn:
//!
//! 1. resets history (see [`coordination::RESET_HISTORY_EACH_TURN`])
//! 2. runs the retrieval loop when web search is on
//! 3. picks the system prompt: normal, or devil mode with the active skill
//! 4. streams the model response as [`OutputEvent::Content`] fragments
//! 5. appends the offline notice or the reference list
//! 6. records the user and assistant messages
//!
//! Turns hold the session lock from start to finish, so concurrent callers
//! on a shared agent are served one at a time and toggles wait for the
//! in-flight turn.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use coordination::search::{references_footer, OFFLINE_NOTICE};
use coordination::{Message, SessionState, SkillRegistry, StatusSnapshot};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::config::{AgentConfig, DEFAULT_MAX_SEARCH_ITERATIONS, DEFAULT_SEARCH_RESULTS};
use crate::events::OutputEvent;
use crate::llm::{AdapterError, LanguageModel, OpenAiModel};
use crate::prompts;
use crate::retrieval::{RetrievalLoop, RetrievalOutcome};
use crate::search::{DuckDuckGoSearch, WebSearch};

/// Capacity of the per-turn event channel.
const EVENT_BUFFER: usize = 64;

struct Inner {
    model: Arc<dyn LanguageModel>,
    retrieval: RetrievalLoop,
    skills: SkillRegistry,
    session: Mutex<SessionState>,
    fixed_today: Option<NaiveDate>,
}

/// Review agent with web-search augmentation. Cheap to clone.
#[derive(Clone)]
pub struct DevilAgent {
    inner: Arc<Inner>,
}

pub struct DevilAgentBuilder {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn WebSearch>,
    skills: SkillRegistry,
    devil_mode: bool,
    web_search: bool,
    max_iterations: usize,
    result_limit: usize,
    today: Option<NaiveDate>,
}

impl DevilAgentBuilder {
    pub fn skills(mut self, skills: SkillRegistry) -> Self {
        self.skills = skills;
        self
    }

    pub fn devil_mode(mut self, enabled: bool) -> Self {
        self.devil_mode = enabled;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn max_search_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn search_results(mut self, n: usize) -> Self {
        self.result_limit = n;
        self
    }

    /// Pin "today" instead of reading the local clock.
    pub fn today(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    pub fn build(self) -> DevilAgent {
        let retrieval = RetrievalLoop::new(self.model.clone(), self.search)
            .with_max_iterations(self.max_iterations)
            .with_result_limit(self.result_limit);
        DevilAgent {
            inner: Arc::new(Inner {
                model: self.model,
                retrieval,
                skills: self.skills,
                session: Mutex::new(SessionState::new(self.devil_mode, self.web_search)),
                fixed_today: self.today,
            }),
        }
    }
}

impl DevilAgent {
    pub fn builder(model: Arc<dyn LanguageModel>, search: Arc<dyn WebSearch>) -> DevilAgentBuilder {
        DevilAgentBuilder {
            model,
            search,
            skills: SkillRegistry::default(),
            devil_mode: true,
            web_search: true,
            max_iterations: DEFAULT_MAX_SEARCH_ITERATIONS,
            result_limit: DEFAULT_SEARCH_RESULTS,
            today: None,
        }
    }

    /// Wire the OpenAI-compatible model, DuckDuckGo search and on-disk skills.
    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let model = OpenAiModel::from_config(config)?;
        let search = DuckDuckGoSearch::new(config.search_timeout)
            .context("Failed to build search client")?;
        let skills = SkillRegistry::from_dir(&config.skills_dir);
        info!(
            model = %model.model(),
            skills = skills.len(),
            prompt_version = prompts::PROMPT_VERSION,
            "Agent initialised"
        );

        Ok(Self::builder(Arc::new(model), Arc::new(search))
            .skills(skills)
            .devil_mode(config.devil_mode)
            .web_search(config.web_search)
            .max_search_iterations(config.max_search_iterations)
            .search_results(config.search_results)
            .build())
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.inner.skills
    }

    fn today(&self) -> NaiveDate {
        self.inner
            .fixed_today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Start a turn and return its event stream.
    ///
    /// The stream is finite and ends after the last footer, or after a
    /// single [`OutputEvent::Error`] if generation failed.
    ///
    /// The turn holds the session until every event is delivered and the
    /// channel holds only `EVENT_BUFFER` events. Poll the stream to the end,
    /// or drop it, before awaiting [`set_mode`](Self::set_mode),
    /// [`set_search`](Self::set_search), [`clear`](Self::clear) or
    /// [`status`](Self::status) on the same agent. Keeping an unpolled stream
    /// alive while awaiting one of those deadlocks.
    pub fn chat(&self, user_input: impl Into<String>) -> ReceiverStream<OutputEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = self.clone();
        let input = user_input.into();
        tokio::spawn(async move {
            agent.run_turn(&input, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Run one turn to completion, sending every event to `sink`.
    pub async fn run_turn(&self, user_input: &str, sink: mpsc::Sender<OutputEvent>) {
        let mut session = self.inner.session.lock().await;
        let web_search = session.web_search();
        let preview: String = user_input.chars().take(50).collect();
        info!(
            input = %preview,
            search = web_search,
            devil = session.devil_mode(),
            "Chat started"
        );

        session.begin_turn();
        let today = self.today();

        let outcome = if web_search {
            let outcome = self.inner.retrieval.run(user_input, today, &sink).await;
            if !outcome.context.is_empty() {
                send(&sink, OutputEvent::progress("Generating response...")).await;
            }
            outcome
        } else {
            send(&sink, OutputEvent::progress("Generating response (offline)...")).await;
            RetrievalOutcome::default()
        };

        let system = self.system_prompt(&mut session, user_input) + &outcome.context;
        session.push(Message::Human(user_input.to_string()));
        let mut messages = Vec::with_capacity(session.history().len() + 1);
        messages.push(Message::System(system));
        messages.extend(session.history().iter().cloned());

        match self.generate(messages, &sink).await {
            Ok(full) => {
                if !web_search {
                    send(&sink, OutputEvent::content(OFFLINE_NOTICE)).await;
                } else {
                    for fragment in references_footer(&outcome.sources) {
                        send(&sink, OutputEvent::Content(fragment)).await;
                    }
                }
                let chars = full.chars().count();
                session.push(Message::Assistant(full));
                info!(chars, history = session.history().len(), "Response");
            }
            Err(e) => {
                error!(error = %e, "Chat error");
                send(&sink, OutputEvent::Error(e.to_string())).await;
            }
        }
    }

    fn system_prompt(&self, session: &mut SessionState, user_input: &str) -> String {
        if !session.devil_mode() {
            return prompts::NORMAL_PREAMBLE.to_string();
        }
        let skills = &self.inner.skills;
        let skill = session.resolve_skill(skills, user_input);
        prompts::devil_preamble(
            &skills.format_summary(),
            skill.map(|s| s.content.as_str()),
        )
    }

    async fn generate(
        &self,
        messages: Vec<Message>,
        sink: &mpsc::Sender<OutputEvent>,
    ) -> Result<String, AdapterError> {
        let mut stream = self.inner.model.stream(messages).await?;
        let mut full = String::new();
        while let Some(piece) = stream.next().await {
            let piece = piece?;
            if piece.is_empty() {
                continue;
            }
            full.push_str(&piece);
            send(sink, OutputEvent::Content(piece)).await;
        }
        Ok(full)
    }

    pub async fn set_mode(&self, devil: bool) -> StatusSnapshot {
        let mut session = self.inner.session.lock().await;
        session.set_mode(devil);
        session.snapshot(&self.inner.skills)
    }

    pub async fn set_search(&self, enabled: bool) -> StatusSnapshot {
        let mut session = self.inner.session.lock().await;
        session.set_search(enabled);
        session.snapshot(&self.inner.skills)
    }

    pub async fn clear(&self) -> StatusSnapshot {
        let mut session = self.inner.session.lock().await;
        session.clear();
        session.snapshot(&self.inner.skills)
    }

    pub async fn status(&self) -> StatusSnapshot {
        self.inner.session.lock().await.snapshot(&self.inner.skills)
    }
}

async fn send(sink: &mpsc::Sender<OutputEvent>, event: OutputEvent) {
    // Receiver gone means the caller stopped listening; the turn still finishes.
    let _ = sink.send(event).await;
}
