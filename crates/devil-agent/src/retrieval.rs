//! Retrieval control loop: extract → search → validate → refine.
//!
//! ```text
//! extract_queries ──► [queries empty?] ──yes──► done
//!                           │ no
//!                           ▼
//!                  multi_search (concurrent) ──► merge into results
//!                           │
//!                           ▼
//!                      validate ──satisfied / unavailable──► done
//!                           │ not satisfied
//!                           ▼
//!                  queries = new_queries (loop, at most N rounds)
//! ```
//!
//! Every model and search call is fault-isolated. The worst case is a turn
//! with no search context.

use std::sync::Arc;

use chrono::NaiveDate;
use coordination::search::{
    build_context, extract_sources, render_validation_digest, SearchQueries, SearchResultMap,
    SearchValidationVerdict,
};
use coordination::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MAX_SEARCH_ITERATIONS, DEFAULT_SEARCH_RESULTS};
use crate::events::OutputEvent;
use crate::llm::{extract_structured, LanguageModel};
use crate::prompts;
use crate::search::{multi_search, WebSearch};

/// Most queries dispatched in one round.
pub const MAX_QUERIES_PER_ROUND: usize = 3;

/// What a retrieval run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    /// Context block for the system prompt; empty when nothing was found.
    pub context: String,
    /// Citation URLs in discovery order.
    pub sources: Vec<String>,
    /// Everything accumulated across rounds.
    pub results: SearchResultMap,
    /// Retrieve-validate rounds actually run.
    pub iterations: usize,
}

/// Bounded retrieve-validate loop over a model and a search engine.
#[derive(Clone)]
pub struct RetrievalLoop {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn WebSearch>,
    max_iterations: usize,
    result_limit: usize,
}

/// Trim, drop blanks, and cap a model-proposed query list.
pub fn sanitize_queries(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_QUERIES_PER_ROUND)
        .collect()
}

async fn emit(progress: &mpsc::Sender<OutputEvent>, text: String) {
    // A closed receiver only means nobody is watching progress.
    let _ = progress.send(OutputEvent::Progress(text)).await;
}

impl RetrievalLoop {
    pub fn new(model: Arc<dyn LanguageModel>, search: Arc<dyn WebSearch>) -> Self {
        Self {
            model,
            search,
            max_iterations: DEFAULT_MAX_SEARCH_ITERATIONS,
            result_limit: DEFAULT_SEARCH_RESULTS,
        }
    }

    /// Override the round cap. Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    pub fn with_result_limit(mut self, n: usize) -> Self {
        self.result_limit = n.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Ask the model for search queries. Failure yields no queries.
    pub async fn extract_queries(&self, today: NaiveDate, user_input: &str) -> Vec<String> {
        let preview: String = user_input.chars().take(50).collect();
        debug!(input = %preview, "Extracting search queries");
        let messages = [
            Message::System(prompts::query_extraction_prompt(today)),
            Message::Human(user_input.to_string()),
        ];
        match extract_structured::<SearchQueries>(self.model.as_ref(), &messages)
            .await
            .ok()
        {
            Some(parsed) => {
                let queries = sanitize_queries(parsed.queries);
                info!(?queries, "Search queries");
                queries
            }
            None => {
                warn!("Search query extraction failed");
                Vec::new()
            }
        }
    }

    /// Ask the model whether `results` answer `user_input` as of `today`.
    pub async fn validate(
        &self,
        today: NaiveDate,
        user_input: &str,
        results: &SearchResultMap,
    ) -> Option<SearchValidationVerdict> {
        let prompt =
            prompts::validation_prompt(today, user_input, &render_validation_digest(results));
        let verdict = extract_structured::<SearchValidationVerdict>(
            self.model.as_ref(),
            &[Message::Human(prompt)],
        )
        .await
        .ok();
        if let Some(v) = &verdict {
            let reason: String = v.reason.chars().take(50).collect();
            info!(satisfied = v.is_satisfied, %reason, "Search validation");
        }
        verdict
    }

    /// Run the whole loop for one turn, reporting stages on `progress`.
    pub async fn run(
        &self,
        user_input: &str,
        today: NaiveDate,
        progress: &mpsc::Sender<OutputEvent>,
    ) -> RetrievalOutcome {
        emit(progress, "Extracting search queries...".into()).await;
        let mut queries = self.extract_queries(today, user_input).await;

        let mut results = SearchResultMap::new();
        let mut iterations = 0;
        let mut stopped = false;

        while iterations < self.max_iterations {
            if queries.is_empty() {
                debug!(iteration = iterations + 1, "No queries, stopping");
                stopped = true;
                break;
            }

            emit(progress, format!("Searching: {}", queries.join(", "))).await;
            info!(iteration = iterations + 1, ?queries, "Retrieval round");
            let batch = multi_search(self.search.clone(), &queries, self.result_limit).await;
            iterations += 1;

            let found = batch.len();
            results.merge(batch);
            debug!(iteration = iterations, found, total = results.len(), "Merged results");
            emit(progress, format!("Found {found} results, validating...")).await;

            match self.validate(today, user_input, &results).await {
                None => {
                    warn!(iteration = iterations, "Validation unavailable, using results as-is");
                    stopped = true;
                    break;
                }
                Some(v) if v.is_satisfied => {
                    info!(iteration = iterations, "Search satisfied");
                    stopped = true;
                    break;
                }
                Some(v) => {
                    queries = sanitize_queries(v.new_queries);
                    info!(reason = %v.reason, ?queries, "Search not satisfied");
                    if !queries.is_empty() {
                        emit(progress, "Refining search...".into()).await;
                    }
                }
            }
        }

        if !stopped {
            warn!(max = self.max_iterations, "Search max iterations reached");
        }

        let context = build_context(today, &results);
        let sources = if results.is_empty() {
            Vec::new()
        } else {
            extract_sources(&results)
        };
        if !results.is_empty() {
            info!(
                results = results.len(),
                iterations,
                sources = sources.len(),
                "Search completed"
            );
        }

        RetrievalOutcome {
            context,
            sources,
            results,
            iterations,
        }
    }
}
