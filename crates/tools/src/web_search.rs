//! Web search tool.
//!
//! Wraps a [`SearchProvider`] with the search retry policy, then cleans the
//! ranked list: hits without an http(s) URL are dropped, repeated URLs keep
//! their first (best ranked) occurrence, and the list is cut to
//! `max_results`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use deepbrief_config::WebSearchConfig;
use deepbrief_core::error::{SearchError, ToolError};
use deepbrief_core::research::SearchResult;
use deepbrief_core::retry::{RetryError, RetryExecutor, RetryPolicy};
use deepbrief_core::search::SearchProvider;
use deepbrief_core::tool::{Tool, ToolKind, ToolOutput};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Smallest number of hits requested from the provider. Cleaning drops
/// duplicates and non-http links, so the request is wider than the result.
const PROVIDER_WINDOW: usize = 10;

pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    policy: RetryPolicy,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, config: &WebSearchConfig) -> Self {
        Self {
            provider,
            max_results: config.max_results,
            policy: config.retry_policy(),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Search for `query`, retrying transient provider failures.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.search_with_cancel(query, None).await
    }

    /// Like [`search`](Self::search), limited to `max_results` hits.
    pub async fn search_limited(
        &self,
        query: &str,
        max_results: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut executor = RetryExecutor::new(self.policy).named("web_search");
        if let Some(token) = cancel {
            executor = executor.with_cancellation(token.clone());
        }

        let provider = &self.provider;
        let window = provider_window(max_results);
        let raw = executor
            .execute(|| provider.search(query, window))
            .await
            .map_err(|e| match e {
                RetryError::Cancelled { .. } => SearchError::Cancelled,
                RetryError::Exhausted { attempts, last } => {
                    warn!(provider = provider.name(), attempts, error = %last, "Search unavailable");
                    SearchError::SearchUnavailable {
                        attempts,
                        reason: last.to_string(),
                    }
                }
            })?;

        let results = clean_results(raw, max_results);
        info!(query, provider = provider.name(), count = results.len(), "Search complete");
        Ok(results)
    }

    pub async fn search_with_cancel(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.search_limited(query, self.max_results, cancel).await
    }
}

fn provider_window(max_results: usize) -> usize {
    max_results.saturating_mul(2).max(PROVIDER_WINDOW)
}

/// Drop non-http hits and duplicate URLs, keep rank order, cap the count.
fn clean_results(raw: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|r| r.url.starts_with("http://") || r.url.starts_with("https://"))
        .filter(|r| seen.insert(r.url.clone()))
        .take(max_results)
        .collect()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web for information on a given topic. Returns ranked results with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results (defaults to the configured limit)",
                    "minimum": 1
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let max_results = input["max_results"]
            .as_u64()
            .map_or(self.max_results, |n| (n as usize).clamp(1, self.max_results));

        let results = self.search_limited(query, max_results, None).await?;
        let output = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput {
            tool: self.kind(),
            success: true,
            output,
            data: Some(serde_json::to_value(&results)?),
        })
    }
}
