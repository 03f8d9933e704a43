//! Search provider implementations.
//!
//! All providers implement `deepbrief_core::SearchProvider`.

pub mod duckduckgo;
pub mod serpapi;

use std::sync::Arc;

use deepbrief_config::WebSearchConfig;
use deepbrief_core::error::SearchError;
use deepbrief_core::search::SearchProvider;

pub use duckduckgo::DuckDuckGoProvider;
pub use serpapi::SerpApiProvider;

/// Build the search provider named by `tools.web_search.engine`, pointed
/// at `tools.web_search.api_url` when one is set.
pub fn build_search_provider(
    config: &WebSearchConfig,
    user_agent: &str,
) -> Result<Arc<dyn SearchProvider>, SearchError> {
    match config.engine.as_str() {
        "duckduckgo" => {
            let mut provider = DuckDuckGoProvider::new(user_agent)?;
            if let Some(url) = &config.api_url {
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
        "serpapi" => {
            let api_key = config.api_key.as_deref().ok_or_else(|| SearchError::Provider {
                provider: "serpapi".into(),
                reason: "SERPAPI_API_KEY is not set".into(),
            })?;
            let mut provider = SerpApiProvider::new(api_key)?;
            if let Some(url) = &config.api_url {
                provider = provider.with_base_url(url);
            }
            Ok(Arc::new(provider))
        }
        other => Err(SearchError::Provider {
            provider: other.into(),
            reason: "unknown search engine".into(),
        }),
    }
}
