//! Page fetcher trait: the abstraction over raw page retrieval.

use async_trait::async_trait;

use crate::error::FetchError;

/// Raw page content as returned by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested.
    pub url: String,

    /// The URL after redirects.
    pub final_url: String,

    /// Value of the Content-Type header, if any.
    pub content_type: Option<String>,

    pub body: String,
}

impl FetchedPage {
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            content_type: Some("text/html".into()),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch a single URL. Timeouts are applied by the caller.
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError>;
}
