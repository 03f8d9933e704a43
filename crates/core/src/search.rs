//! Search provider trait: the abstraction over web search backends.
//!
//! A provider turns a query into ranked hits. It knows nothing about
//! retries, limits, or deduplication; `WebSearchTool` layers those on top.
//!
//! Implementations: DuckDuckGo (HTML), SerpAPI.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::research::SearchResult;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// The provider name (e.g., "duckduckgo", "serpapi").
    fn name(&self) -> &str;

    /// Run one query. Results must be in provider relevance order.
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> std::result::Result<Vec<SearchResult>, SearchError>;
}
