//! reqwest-backed page fetcher.

use async_trait::async_trait;
use deepbrief_core::error::FetchError;
use deepbrief_core::fetch::{FetchedPage, PageFetcher};
use tracing::debug;

/// Fetches pages over HTTP(S), following up to 10 redirects.
///
/// No client-level timeout: the content extractor bounds each attempt.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// Only markup and plain text can be cleaned into readable text.
fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = content_type.as_deref().filter(|ct| !is_textual(ct)) {
            return Err(FetchError::UnsupportedContent(ct.to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response body: {e}")))?;

        debug!(url, final_url = %final_url, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            content_type,
            body,
        })
    }
}
