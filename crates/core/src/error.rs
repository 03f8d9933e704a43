//! Error types for the DeepBrief domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only `WorkflowError`
//! ever reaches a caller of the research pipeline.

use thiserror::Error;

/// The top-level error type for all DeepBrief operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Workflow errors ---
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    // --- Search errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Fetch errors ---
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures that terminate a research run.
///
/// Per-source extraction failures never appear here: they are absorbed
/// into `WorkflowResult::partial_failures`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Research run cancelled")]
    Cancelled,
}

impl WorkflowError {
    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::InvalidTopic(_) => "invalid_topic",
            WorkflowError::SearchUnavailable(_) => "search_unavailable",
            WorkflowError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Search provider unavailable after {attempts} attempt(s): {reason}")]
    SearchUnavailable { attempts: u32, reason: String },

    #[error("Search provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("Search cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status_code} from {url}")]
    Status { url: String, status_code: u16 },

    #[error("Request timed out after {timeout_secs:.1}s")]
    Timeout { timeout_secs: f64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("No readable content")]
    EmptyContent,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    /// Eviction could not bring memory back under its token budget.
    /// This is an internal defect, logged and never surfaced to callers.
    #[error("Memory overflow: {total_tokens} tokens held, limit {max_token_limit}")]
    MemoryOverflow {
        total_tokens: usize,
        max_token_limit: usize,
    },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Tool output serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
