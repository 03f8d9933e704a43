//! Research domain types: the artifacts that flow through one workflow run.
//!
//! A run starts from a [`Topic`], produces ranked [`SearchResult`]s, one
//! [`ExtractedDocument`] per attempted source, and ends as a
//! [`WorkflowResult`] combining sources, synthesis, and partial failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WorkflowError;

/// A user-supplied research query.
///
/// Can only be constructed through [`Topic::parse`], so holding a `Topic`
/// proves the text is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Validate raw input. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::InvalidTopic(
                "topic must not be empty or whitespace".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// The outcome of extracting one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    /// Equal to the originating `SearchResult::url`.
    pub source_url: String,

    /// Page title, when the page declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Cleaned text, already cut to the configured maximum length.
    pub text: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ExtractedDocument {
    pub fn succeeded(source_url: impl Into<String>, title: Option<String>, text: String) -> Self {
        Self {
            source_url: source_url.into(),
            title,
            text,
            success: true,
            failure_reason: None,
        }
    }

    pub fn failed(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            title: None,
            text: String::new(),
            success: false,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Key points folded out of the successfully extracted documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    pub key_points: Vec<String>,

    /// URLs of every document that contributed text, unique, in rank order.
    pub source_urls: Vec<String>,

    /// Optional LLM-written brief over the same documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SynthesisResult {
    /// True when nothing could be synthesized (no successful documents).
    pub fn is_degraded(&self) -> bool {
        self.key_points.is_empty() && self.source_urls.is_empty()
    }
}

/// A per-source extraction error that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub url: String,
    pub reason: String,
}

/// Timing and counts for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Sources returned by the search, attempted or not.
    pub source_count: usize,
    /// Sources recorded in `partial_failures`.
    pub failure_count: usize,
}

/// The externally visible artifact of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: String,
    pub topic: String,
    pub sources: Vec<SearchResult>,
    pub synthesis: SynthesisResult,
    pub partial_failures: Vec<PartialFailure>,
    pub metadata: RunMetadata,
}
