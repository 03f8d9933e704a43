//! SerpAPI (Google) search.
//!
//! Organic results come first; when they fall short of the requested
//! count, Google News results top up the list.

use async_trait::async_trait;
use deepbrief_core::error::SearchError;
use deepbrief_core::research::SearchResult;
use deepbrief_core::search::SearchProvider;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerpApiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| provider_error(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn query(&self, engine: &str, query: &str, num: usize) -> Result<SerpResponse, SearchError> {
        let url = format!(
            "{}/search.json?engine={}&q={}&num={}&hl=en&api_key={}",
            self.base_url,
            engine,
            urlencoding::encode(query),
            num,
            urlencoding::encode(&self.api_key),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| provider_error(e.to_string()))?;

        let status = response.status();
        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("HTTP {status}, unreadable body: {e}")))?;

        if let Some(error) = body.error {
            return Err(provider_error(error));
        }
        if !status.is_success() {
            return Err(provider_error(format!("HTTP {status}")));
        }
        Ok(body)
    }
}

fn provider_error(reason: impl Into<String>) -> SearchError {
    SearchError::Provider {
        provider: "serpapi".into(),
        reason: reason.into(),
    }
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> std::result::Result<Vec<SearchResult>, SearchError> {
        debug!(query, "Querying SerpAPI");
        let web = self.query("google", query, num_results).await?;
        let mut results: Vec<SearchResult> =
            web.organic_results.into_iter().filter_map(SerpHit::into_result).collect();

        // A failed top-up keeps the organic hits.
        if results.len() < num_results {
            match self.query("google_news", query, num_results).await {
                Ok(news) => {
                    results.extend(news.news_results.into_iter().filter_map(SerpHit::into_result))
                }
                Err(e) => warn!(query, error = %e, "News top-up failed, keeping organic results"),
            }
        }

        results.truncate(num_results);
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<SerpHit>,
    #[serde(default)]
    news_results: Vec<SerpHit>,
}

#[derive(Debug, Deserialize)]
struct SerpHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl SerpHit {
    /// Hits without a title or link are skipped.
    fn into_result(self) -> Option<SearchResult> {
        let title = self.title?.trim().to_string();
        let url = self.link?.trim().to_string();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        let snippet = self
            .snippet
            .or(self.description)
            .unwrap_or_default()
            .trim()
            .to_string();
        Some(SearchResult { title, url, snippet })
    }
}
