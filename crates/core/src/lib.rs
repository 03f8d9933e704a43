//! # DeepBrief Core
//!
//! Domain types, traits, and error definitions for the DeepBrief research
//! pipeline. This crate has **no HTTP or vendor dependencies**: it defines
//! the model every other crate implements against.
//!
//! External collaborators (search engine, page fetcher, LLM) are traits
//! here; adapters live in `deepbrief-tools` and `deepbrief-providers`.

pub mod error;
pub mod event;
pub mod fetch;
pub mod provider;
pub mod research;
pub mod retry;
pub mod search;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus, WorkflowPhase};
pub use fetch::{FetchedPage, PageFetcher};
pub use provider::{Message, Provider, ProviderRequest, ProviderResponse, Role};
pub use research::{
    ExtractedDocument, PartialFailure, RunMetadata, SearchResult, SynthesisResult, Topic, WorkflowResult,
};
pub use retry::{RetryError, RetryExecutor, RetryPolicy};
pub use search::SearchProvider;
pub use tool::{Tool, ToolKind, ToolOutput};
