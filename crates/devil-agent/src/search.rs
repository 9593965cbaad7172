//! Web search adapter and concurrent fan-out.
//!
//! ```text
//! queries ──► JoinSet::spawn(search(q_i)) × N
//!                 │  per-task failure → "[Search failed: …]"
//!                 ▼
//!         results in input order
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordination::search::{render_hits, search_failed, SearchHit};
use scraper::{Html, Selector};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("{0}")]
    Transport(String),

    #[error("search endpoint returned HTTP {0}")]
    Status(u16),

    #[error("search client misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `limit` hits for `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Run one query and render it as result text. Failures become placeholders.
pub async fn search_text(engine: &dyn WebSearch, query: &str, limit: usize) -> String {
    match engine.search(query, limit).await {
        Ok(hits) => {
            debug!(query = %query, hits = hits.len(), "Search complete");
            render_hits(query, &hits)
        }
        Err(e) => {
            error!(query = %query, error = %e, "Search error");
            search_failed(e)
        }
    }
}

/// Search every query concurrently and return `(query, text)` in input order.
///
/// Always yields one entry per query: errors and panicked tasks turn into
/// `[Search failed: …]` placeholders without affecting siblings.
pub async fn multi_search(
    engine: Arc<dyn WebSearch>,
    queries: &[String],
    limit: usize,
) -> Vec<(String, String)> {
    info!(?queries, "Multi-search");
    let mut join_set: JoinSet<(usize, String)> = JoinSet::new();

    for (idx, query) in queries.iter().enumerate() {
        let engine = engine.clone();
        let query = query.clone();
        join_set.spawn(async move { (idx, search_text(engine.as_ref(), &query, limit).await) });
    }

    let mut slots: Vec<Option<String>> = vec![None; queries.len()];
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok((idx, text)) => slots[idx] = Some(text),
            Err(e) => {
                // Slot stays empty and is filled below.
                warn!(error = %e, "search task panicked");
            }
        }
    }

    queries
        .iter()
        .cloned()
        .zip(slots)
        .map(|(q, text)| {
            let text = text.unwrap_or_else(|| search_failed("search task aborted"));
            (q, text)
        })
        .collect()
}

/// DuckDuckGo HTML-endpoint search.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Configuration(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: DDG_HTML_URL.to_string(),
        })
    }

    /// Point at a different HTML endpoint (mirrors, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("q={}&b=&kl=wt-wt", urlencoding::encode(query)))
            .send()
            .await
            .map_err(|e| SearchError::Transport(format!("DuckDuckGo search failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Transport(format!("failed to read DuckDuckGo response: {e}")))?;

        parse_ddg_html(&html, limit)
    }
}

/// Parse the DuckDuckGo HTML page into hits.
///
/// Each `.result` block carries a `.result__a` title link and usually a
/// `.result__snippet`. Ads and links without an absolute target are skipped.
pub fn parse_ddg_html(html: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
    if html.contains("anomaly-modal") || html.contains("select all squares containing") {
        warn!("DuckDuckGo bot detection triggered");
        return Err(SearchError::Transport(
            "DuckDuckGo bot detection triggered".to_string(),
        ));
    }

    let document = Html::parse_document(html);
    let result_selector = selector(".result")?;
    let title_selector = selector(".result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for element in document.select(&result_selector) {
        if hits.len() >= limit {
            break;
        }
        if element
            .value()
            .attr("class")
            .is_some_and(|class| class.contains("result--ad"))
        {
            continue;
        }
        let Some(title_node) = element.select(&title_selector).next() else {
            continue;
        };

        let title = collapse_text(title_node.text());
        let url = resolve_ddg_url(title_node.value().attr("href").unwrap_or_default());
        let body = element
            .select(&snippet_selector)
            .next()
            .map(|node| collapse_text(node.text()))
            .unwrap_or_default();

        if !title.is_empty() && !url.is_empty() {
            hits.push(SearchHit { title, body, url });
        }
    }

    Ok(hits)
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|_| SearchError::Configuration(format!("bad selector {css}")))
}

/// Join text nodes and collapse runs of whitespace.
fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap DuckDuckGo's `/l/?uddg=<encoded>` redirect links.
fn resolve_ddg_url(href: &str) -> String {
    if let Some(rest) = href
        .strip_prefix("//duckduckgo.com/l/?uddg=")
        .or_else(|| href.strip_prefix("https://duckduckgo.com/l/?uddg="))
        .or_else(|| href.strip_prefix("/l/?uddg="))
    {
        let encoded = rest.split('&').next().unwrap_or(rest);
        urlencoding::decode(encoded)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| href.to_string())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        String::new()
    }
}
