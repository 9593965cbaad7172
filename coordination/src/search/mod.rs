//! Deterministic half of web-search augmentation.
//!
//! Everything here is pure text handling: rendering hits, accumulating
//! results across retrieval iterations, assembling the context block handed
//! to the generator, and pulling citation URLs back out of it. Network calls
//! live in the agent crate.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Characters of each hit body kept in rendered results.
pub const HIT_BODY_CHARS: usize = 200;
/// Characters of each query's results shown to the validator.
pub const VALIDATION_DIGEST_CHARS: usize = 300;
/// Most references listed after a response.
pub const MAX_REFERENCES: usize = 5;
/// Marker preceding a hit URL in rendered results.
pub const SOURCE_MARKER: &str = "Source: ";

/// Appended to every response produced with web search disabled.
pub const OFFLINE_NOTICE: &str =
    "\n\n---\n⚠️ *Response generated without web search. Information may not be current.*";
/// Header of the reference list appended after a search-backed response.
pub const REFERENCES_HEADER: &str = "\n\n---\n**References:**\n";

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, body: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: url.into(),
        }
    }
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Render the hits for one query as the text stored in a [`SearchResultMap`].
pub fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return no_results(query);
    }
    hits.iter()
        .map(|h| {
            format!(
                "- {}: {}...\n  {SOURCE_MARKER}{}",
                h.title,
                take_chars(&h.body, HIT_BODY_CHARS),
                h.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Placeholder stored when a query returns nothing.
pub fn no_results(query: &str) -> String {
    format!("[No results: {query}]")
}

/// Placeholder stored when a query's search call fails.
pub fn search_failed(reason: impl std::fmt::Display) -> String {
    format!("[Search failed: {reason}]")
}

/// Query-string → result-text map that keeps insertion order and only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultMap {
    entries: Vec<(String, String)>,
}

impl SearchResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless `query` is already present. Returns whether it was added.
    pub fn insert(&mut self, query: impl Into<String>, result: impl Into<String>) -> bool {
        let query = query.into();
        if self.contains(&query) {
            return false;
        }
        self.entries.push((query, result.into()));
        true
    }

    /// Merge a batch in order; existing keys are left untouched.
    pub fn merge<I, K, V>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut added = 0;
        for (query, result) in batch {
            if self.insert(query, result) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.iter().any(|(q, _)| q == query)
    }

    pub fn get(&self, query: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, r)| r.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(q, r)| (q.as_str(), r.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(q, _)| q.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Structured output of the query-extraction call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchQueries {
    /// 1-3 concise search keywords extracted from user query.
    #[serde(default)]
    pub queries: Vec<String>,
}

/// Structured output of the validation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchValidationVerdict {
    /// True if results contain current/relevant date info.
    pub is_satisfied: bool,
    /// Brief reason.
    #[serde(default)]
    pub reason: String,
    /// New queries if not satisfied, must include date.
    #[serde(default)]
    pub new_queries: Vec<String>,
}

/// `[query]: <first 300 chars>` per entry, one per line, for the validator.
pub fn render_validation_digest(results: &SearchResultMap) -> String {
    results
        .iter()
        .map(|(q, r)| format!("[{q}]: {}", take_chars(r, VALIDATION_DIGEST_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the context block appended to the system prompt.
///
/// Empty when `results` is empty, so the caller falls back to unaugmented
/// generation.
pub fn build_context(today: NaiveDate, results: &SearchResultMap) -> String {
    if results.is_empty() {
        return String::new();
    }
    let today = today.format("%Y-%m-%d");
    let body = results
        .iter()
        .map(|(q, r)| format!("[{q}]\n{r}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "\n\n<search_results date=\"{today}\">\n{body}\n</search_results>\n\n\
         Today is {today}. Answer based on search results above. Use markdown formatting. \
         Cite sources with [N](url) format when referencing specific facts."
    )
}

/// Every `http` URL following a `Source: ` marker, in discovery order.
pub fn extract_sources(results: &SearchResultMap) -> Vec<String> {
    results
        .iter()
        .flat_map(|(_, r)| r.lines())
        .filter_map(|line| {
            line.rfind(SOURCE_MARKER)
                .map(|idx| &line[idx + SOURCE_MARKER.len()..])
        })
        .map(str::trim)
        .filter(|url| url.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Fragments of the reference list: header, then `[i]: url` for the first
/// [`MAX_REFERENCES`] sources. Empty when there are no sources.
pub fn references_footer(sources: &[String]) -> Vec<String> {
    if sources.is_empty() {
        return Vec::new();
    }
    std::iter::once(REFERENCES_HEADER.to_string())
        .chain(
            sources
                .iter()
                .take(MAX_REFERENCES)
                .enumerate()
                .map(|(i, url)| format!("[{}]: {url}\n", i + 1)),
        )
        .collect()
}
