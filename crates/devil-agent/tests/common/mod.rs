//! Shared fakes for agent integration tests. Nothing here touches the network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use coordination::search::SearchHit;
use coordination::Message;
use devil_agent::llm::{AdapterError, LanguageModel, ResponseSchema, TextStream};
use devil_agent::search::{SearchError, WebSearch};
use futures::StreamExt;
use mockall::mock;

mock! {
    pub Search {}

    #[async_trait]
    impl WebSearch for Search {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
    }
}

/// Scripted model: one canned answer for query extraction, a queue of
/// validation verdicts, and a canned token stream.
pub struct ScriptedModel {
    extraction: Result<String, AdapterError>,
    verdicts: Mutex<VecDeque<Result<String, AdapterError>>>,
    tokens: Vec<Result<String, AdapterError>>,
    stream_start_error: Option<AdapterError>,
    pub extraction_calls: Mutex<usize>,
    pub validation_prompts: Mutex<Vec<String>>,
    pub streamed: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            extraction: Ok(r#"{"queries": []}"#.to_string()),
            verdicts: Mutex::new(VecDeque::new()),
            tokens: vec![Ok("Hello".into()), Ok(", ".into()), Ok("world".into())],
            stream_start_error: None,
            extraction_calls: Mutex::new(0),
            validation_prompts: Mutex::new(Vec::new()),
            streamed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_queries(mut self, queries: &[&str]) -> Self {
        self.extraction = Ok(serde_json::json!({ "queries": queries }).to_string());
        self
    }

    pub fn with_extraction(mut self, result: Result<String, AdapterError>) -> Self {
        self.extraction = result;
        self
    }

    pub fn with_verdict(self, satisfied: bool, new_queries: &[&str]) -> Self {
        let raw = serde_json::json!({
            "is_satisfied": satisfied,
            "reason": if satisfied { "fresh" } else { "stale dates" },
            "new_queries": new_queries,
        })
        .to_string();
        self.verdicts.lock().unwrap().push_back(Ok(raw));
        self
    }

    pub fn with_raw_verdict(self, result: Result<String, AdapterError>) -> Self {
        self.verdicts.lock().unwrap().push_back(result);
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<Result<String, AdapterError>>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_stream_start_error(mut self, err: AdapterError) -> Self {
        self.stream_start_error = Some(err);
        self
    }

    pub fn validation_calls(&self) -> usize {
        self.validation_prompts.lock().unwrap().len()
    }

    /// System prompt of the n-th streamed generation.
    pub fn system_prompt(&self, n: usize) -> String {
        match self.streamed.lock().unwrap().get(n).and_then(|m| m.first()) {
            Some(Message::System(text)) => text.clone(),
            other => panic!("no system prompt for stream {n}: {other:?}"),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[Message],
        _schema: Option<&ResponseSchema>,
    ) -> Result<String, AdapterError> {
        let is_extraction = matches!(
            messages.first(),
            Some(Message::System(text)) if text.contains("Extract 1-3 search keywords")
        );
        if is_extraction {
            *self.extraction_calls.lock().unwrap() += 1;
            return self.extraction.clone();
        }
        let prompt = messages
            .last()
            .map(|m| m.text().to_string())
            .unwrap_or_default();
        self.validation_prompts.lock().unwrap().push(prompt);
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::Transport("no verdict scripted".into())))
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<TextStream, AdapterError> {
        self.streamed.lock().unwrap().push(messages);
        if let Some(err) = &self.stream_start_error {
            return Err(err.clone());
        }
        Ok(futures::stream::iter(self.tokens.clone()).boxed())
    }
}

pub fn hits(query: &str, n: usize) -> Vec<SearchHit> {
    (1..=n)
        .map(|i| SearchHit {
            title: format!("{query} result {i}"),
            body: format!("Snippet {i} about {query}"),
            url: format!("https://news.example.com/{i}"),
        })
        .collect()
}

/// A search mock that answers every query with `n` hits.
pub fn search_returning(n: usize) -> MockSearch {
    let mut search = MockSearch::new();
    search
        .expect_search()
        .returning(move |q, _| Ok(hits(q, n)));
    search
}

pub fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
