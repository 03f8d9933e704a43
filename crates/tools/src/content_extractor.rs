//! Content extraction: fetch a page, strip it to readable text.
//!
//! Extraction never fails with an `Err`. Every outcome, including retry
//! exhaustion, becomes an [`ExtractedDocument`]; failures carry
//! `success = false` and a reason.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deepbrief_config::{ContentExtractorConfig, MAX_WAIT_SECS};
use deepbrief_core::error::{FetchError, ToolError};
use deepbrief_core::fetch::PageFetcher;
use deepbrief_core::research::ExtractedDocument;
use deepbrief_core::retry::{RetryError, RetryExecutor, RetryPolicy};
use deepbrief_core::tool::{Tool, ToolKind, ToolOutput};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::html;

pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    policy: RetryPolicy,
    timeout: Duration,
    max_content_length: usize,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ContentExtractorConfig) -> Self {
        Self {
            fetcher,
            policy: config.retry_policy(),
            timeout: config.timeout(),
            max_content_length: config.max_content_length,
        }
    }

    /// The configured per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extract `url`, bounding each attempt by `timeout`.
    pub async fn extract(&self, url: &str, timeout: Duration) -> ExtractedDocument {
        self.extract_with_cancel(url, timeout, None).await
    }

    pub async fn extract_with_cancel(
        &self,
        url: &str,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> ExtractedDocument {
        if let Err(e) = validate_url(url) {
            debug!(url, error = %e, "Rejected URL before fetching");
            return ExtractedDocument::failed(url, e.to_string());
        }

        let mut executor = RetryExecutor::new(self.policy).named("content_extractor");
        if let Some(token) = cancel {
            executor = executor.with_cancellation(token.clone());
        }

        match executor.execute(|| self.attempt(url, timeout)).await {
            Ok((title, text)) => {
                info!(url, chars = text.chars().count(), "Extracted content");
                ExtractedDocument::succeeded(url, title, text)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(url, attempts, error = %last, "Content extraction failed");
                ExtractedDocument::failed(url, last.to_string())
            }
            Err(RetryError::Cancelled { .. }) => ExtractedDocument::failed(url, "Extraction cancelled"),
        }
    }

    /// One fetch-and-clean attempt.
    async fn attempt(&self, url: &str, timeout: Duration) -> Result<(Option<String>, String), FetchError> {
        let page = tokio::time::timeout(timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout {
                timeout_secs: timeout.as_secs_f64(),
            })??;

        let text = html::extract_text(&page.body);
        if text.is_empty() {
            return Err(FetchError::EmptyContent);
        }
        Ok((html::extract_title(&page.body), truncate_chars(text, self.max_content_length)))
    }
}

fn validate_url(url: &str) -> Result<(), FetchError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".pdf") {
        return Err(FetchError::UnsupportedContent("application/pdf".into()));
    }
    Ok(())
}

/// Hard cut at `max` characters, never inside a UTF-8 sequence.
fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

#[async_trait]
impl Tool for ContentExtractor {
    fn kind(&self) -> ToolKind {
        ToolKind::ContentExtractor
    }

    fn description(&self) -> &str {
        "Fetch a web page and extract its readable text content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to extract"
                },
                "timeout_secs": {
                    "type": "number",
                    "description": "Per-attempt timeout in seconds (defaults to the configured timeout)"
                }
            },
            "required": ["url"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = input["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        let timeout = match input["timeout_secs"].as_f64() {
            Some(secs) if secs > 0.0 && secs <= MAX_WAIT_SECS => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(ToolError::InvalidArguments(format!(
                    "timeout_secs must be > 0 and at most {MAX_WAIT_SECS}, got {secs}"
                )));
            }
            None => self.timeout,
        };

        let document = self.extract(url, timeout).await;
        let output = match &document.failure_reason {
            Some(reason) => format!("Failed to extract content from {url}: {reason}"),
            None => document.text.clone(),
        };

        Ok(ToolOutput {
            tool: self.kind(),
            success: document.success,
            output,
            data: Some(serde_json::to_value(&document)?),
        })
    }
}
