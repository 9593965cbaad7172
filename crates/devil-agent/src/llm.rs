//! Language model adapter.
//!
//! Two capabilities sit behind [`LanguageModel`]:
//!
//! - `complete`: one non-streaming answer, optionally constrained to a JSON
//!   schema via `response_format`. [`extract_structured`] builds on it and
//!   returns a tagged [`Extraction`] instead of an error.
//! - `stream`: incremental text fragments for the final response.
//!
//! [`OpenAiModel`] talks to any OpenAI-compatible endpoint: completions go
//! through rig, streaming reads the `/chat/completions` SSE feed directly.

use std::fmt;

use async_trait::async_trait;
use coordination::Message;
use futures::stream::BoxStream;
use futures::StreamExt;
use rig::client::CompletionClient;
use rig::completion::Chat;
use rig::providers::openai;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::config::AgentConfig;

/// Lazy, ordered, finite sequence of generated text fragments.
pub type TextStream = BoxStream<'static, Result<String, AdapterError>>;

/// Failures talking to the model endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// Connection, timeout, or mid-stream read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Client could not be built from the configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Outcome of a structured-extraction call.
///
/// Both failure variants mean "no usable result" to callers; the split only
/// matters for logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Ok(T),
    ParseFailure(String),
    TransportError(String),
}

impl<T> Extraction<T> {
    /// Collapse to `Option`, logging the failure kind.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            Self::ParseFailure(reason) => {
                warn!(kind = "parse_failure", %reason, "Structured extraction unusable");
                None
            }
            Self::TransportError(reason) => {
                warn!(kind = "transport_error", %reason, "Structured extraction unusable");
                None
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl<T> fmt::Display for Extraction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "ok"),
            Self::ParseFailure(r) => write!(f, "parse_failure: {r}"),
            Self::TransportError(r) => write!(f, "transport_error: {r}"),
        }
    }
}

/// A named JSON schema sent as `response_format`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

impl ResponseSchema {
    /// Derive the schema for `T` with schemars.
    pub fn for_type<T: JsonSchema>() -> Result<Self, AdapterError> {
        let root = schemars::schema_for!(T);
        let name = root
            .schema
            .metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_else(|| "structured_output".to_string());
        let schema =
            serde_json::to_value(&root).map_err(|e| AdapterError::Parse(e.to_string()))?;
        Ok(Self { name, schema })
    }

    /// `additional_params` value for the rig agent builder.
    pub fn to_params(&self) -> Value {
        json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": self.name,
                    "schema": self.schema,
                }
            }
        })
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Single completion over `messages`; `schema` requests JSON output.
    async fn complete(
        &self,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, AdapterError>;

    /// Stream the response to `messages` fragment by fragment.
    async fn stream(&self, messages: Vec<Message>) -> Result<TextStream, AdapterError>;
}

/// Ask for a `T` and parse the answer. Never returns an error.
pub async fn extract_structured<T>(model: &dyn LanguageModel, messages: &[Message]) -> Extraction<T>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = match ResponseSchema::for_type::<T>() {
        Ok(s) => s,
        Err(e) => return Extraction::ParseFailure(e.to_string()),
    };
    match model.complete(messages, Some(&schema)).await {
        Ok(raw) => parse_structured(&raw),
        Err(e) => Extraction::TransportError(e.to_string()),
    }
}

/// Parse model output as `T`, tolerating markdown fences and chatter
/// around the JSON object.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Extraction<T> {
    if let Ok(v) = serde_json::from_str::<T>(raw.trim()) {
        return Extraction::Ok(v);
    }
    let Some(block) = extract_json_object(raw) else {
        return Extraction::ParseFailure(format!("no JSON object in response: {}", preview(raw)));
    };
    match serde_json::from_str::<T>(block) {
        Ok(v) => Extraction::Ok(v),
        Err(e) => Extraction::ParseFailure(format!("{e}: {}", preview(raw))),
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn preview(s: &str) -> String {
    s.chars().take(120).collect()
}

/// OpenAI wire shape of a message sequence.
pub fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({ "role": m.role(), "content": m.text() }))
        .collect()
}

/// Incremental decoder for an OpenAI `chat/completions` SSE body.
///
/// Bytes may split lines, and multi-byte characters, anywhere. Raw bytes
/// are buffered and only complete lines are decoded as UTF-8.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

/// One decoded SSE payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Delta(String),
    Failed(String),
    Done,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(event) = self.decode_line(line.trim()) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the body ends.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        self.decode_line(line.trim()).into_iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &str) -> Option<SseEvent> {
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return Some(SseEvent::Done);
        }
        let obj: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable SSE line");
                return None;
            }
        };
        if let Some(err) = obj.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Some(SseEvent::Failed(message));
        }
        obj.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
            .filter(|piece| !piece.is_empty())
            .map(|piece| SseEvent::Delta(piece.to_string()))
    }
}

/// OpenAI-compatible model endpoint.
pub struct OpenAiModel {
    client: openai::CompletionsClient,
    http: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f64,
}

impl OpenAiModel {
    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.completions_client()?,
            http: reqwest::Client::new(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(
        &self,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<String, AdapterError> {
        let preamble = messages
            .iter()
            .filter(|m| matches!(m, Message::System(_)))
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut turns: Vec<&Message> = messages
            .iter()
            .filter(|m| !matches!(m, Message::System(_)))
            .collect();
        let prompt = match turns.pop() {
            Some(Message::Human(text)) => text.clone(),
            Some(other) => {
                turns.push(other);
                String::new()
            }
            None => String::new(),
        };
        let history = turns
            .into_iter()
            .map(|m| match m {
                Message::Assistant(t) => rig::completion::Message::assistant(t.as_str()),
                other => rig::completion::Message::user(other.text()),
            })
            .collect::<Vec<_>>();

        let mut builder = self
            .client
            .agent(&self.model)
            .preamble(&preamble)
            .temperature(if schema.is_some() { 0.0 } else { self.temperature });
        if let Some(schema) = schema {
            builder = builder.additional_params(schema.to_params());
        }
        let agent = builder.build();

        agent
            .chat(prompt.as_str(), history)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))
    }

    async fn stream(&self, messages: Vec<Message>) -> Result<TextStream, AdapterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": to_wire_messages(&messages),
            "temperature": self.temperature,
            "stream": true,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel::<Result<String, AdapterError>>(64);
        let mut bytes = resp.bytes_stream();
        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(AdapterError::Transport(e.to_string()))).await;
                        return;
                    }
                };
                if !forward(&tx, decoder.push(&chunk)).await {
                    return;
                }
            }
            forward(&tx, decoder.finish()).await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Send decoded events downstream. Returns false once the stream is over.
async fn forward(tx: &mpsc::Sender<Result<String, AdapterError>>, events: Vec<SseEvent>) -> bool {
    for event in events {
        let item = match event {
            SseEvent::Delta(piece) => Ok(piece),
            SseEvent::Failed(reason) => Err(AdapterError::Transport(reason)),
            SseEvent::Done => return false,
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return false;
        }
    }
    true
}
