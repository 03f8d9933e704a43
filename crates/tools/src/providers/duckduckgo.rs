//! DuckDuckGo HTML search.
//!
//! Scrapes `html.duckduckgo.com`, which needs no API key. Result links are
//! wrapped in a `/l/?uddg=` redirect and unwrapped here.

use std::sync::LazyLock;

use async_trait::async_trait;
use deepbrief_core::error::SearchError;
use deepbrief_core::research::SearchResult;
use deepbrief_core::search::SearchProvider;
use regex_lite::Regex;
use tracing::debug;

use crate::html;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("static pattern is valid")
});

static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:a|div)\b[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</(?:a|div)>"#)
        .expect("static pattern is valid")
});

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoProvider {
    pub fn new(user_agent: &str) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| provider_error(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
        })
    }

    /// Point at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn provider_error(reason: impl Into<String>) -> SearchError {
    SearchError::Provider {
        provider: "duckduckgo".into(),
        reason: reason.into(),
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> std::result::Result<Vec<SearchResult>, SearchError> {
        let url = format!("{}/html/?q={}", self.base_url, urlencoding::encode(query));
        debug!(query, "Querying DuckDuckGo");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| provider_error(format!("Failed to read response body: {e}")))?;

        let mut results = parse_results(&body);
        results.truncate(num_results);
        Ok(results)
    }
}

/// Parse the result list of a DuckDuckGo HTML page, in page order.
fn parse_results(body: &str) -> Vec<SearchResult> {
    let links: Vec<_> = RESULT_LINK_RE.captures_iter(body).collect();

    links
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let href = caps.get(1)?.as_str();
            let title = html::extract_text(caps.get(2)?.as_str());

            // The snippet belongs to this result only if it appears
            // before the next result link.
            let window_end = links
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(body.len(), |m| m.start());
            let snippet = SNIPPET_RE
                .captures(&body[whole.end()..window_end])
                .and_then(|c| c.get(1))
                .map(|m| html::extract_text(m.as_str()).replace('\n', " "))
                .unwrap_or_default();

            Some(SearchResult {
                title: title.replace('\n', " "),
                url: unwrap_redirect(href),
                snippet,
            })
        })
        .collect()
}

/// `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=..` → `https://example.com`
fn unwrap_redirect(href: &str) -> String {
    let href = href.replace("&amp;", "&");
    let target = href
        .split_once("uddg=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest));

    match target {
        Some(encoded) => urlencoding::decode(encoded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| encoded.to_string()),
        None if href.starts_with("//") => format!("https:{href}"),
        None => href,
    }
}
