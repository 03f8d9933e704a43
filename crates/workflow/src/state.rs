//! Typed research states.
//!
//! Every state is its own type and every transition consumes the state it
//! leaves, so a run cannot synthesize before extraction has resolved or
//! fail once extraction has started.

use std::time::Duration;

use chrono::Utc;
use deepbrief_core::error::{SearchError, WorkflowError};
use deepbrief_core::event::WorkflowPhase;
use deepbrief_core::research::{
    ExtractedDocument, PartialFailure, RunMetadata, SearchResult, SynthesisResult, Topic,
    WorkflowResult,
};

/// Implemented by every state so the runner can report where it is.
pub trait State {
    const PHASE: WorkflowPhase;

    fn phase(&self) -> WorkflowPhase {
        Self::PHASE
    }
}

/// Nothing has happened yet.
#[derive(Debug, Default)]
pub struct Idle;

#[derive(Debug)]
pub struct Searching {
    topic: Topic,
}

#[derive(Debug)]
pub struct Extracting {
    topic: Topic,
    sources: Vec<SearchResult>,
}

#[derive(Debug)]
pub struct Synthesizing {
    topic: Topic,
    sources: Vec<SearchResult>,
    documents: Vec<ExtractedDocument>,
    partial_failures: Vec<PartialFailure>,
}

#[derive(Debug)]
pub struct Completed {
    result: WorkflowResult,
}

#[derive(Debug)]
pub struct Failed {
    topic: Topic,
    error: WorkflowError,
}

#[derive(Debug)]
pub struct Cancelled {
    topic: Topic,
    from: WorkflowPhase,
}

impl State for Idle {
    const PHASE: WorkflowPhase = WorkflowPhase::Idle;
}
impl State for Searching {
    const PHASE: WorkflowPhase = WorkflowPhase::Searching;
}
impl State for Extracting {
    const PHASE: WorkflowPhase = WorkflowPhase::Extracting;
}
impl State for Synthesizing {
    const PHASE: WorkflowPhase = WorkflowPhase::Synthesizing;
}
impl State for Completed {
    const PHASE: WorkflowPhase = WorkflowPhase::Completed;
}
impl State for Failed {
    const PHASE: WorkflowPhase = WorkflowPhase::Failed;
}
impl State for Cancelled {
    const PHASE: WorkflowPhase = WorkflowPhase::Cancelled;
}

impl Idle {
    /// Validate the topic. An invalid topic never leaves `Idle`.
    pub fn start(self, raw_topic: &str) -> Result<Searching, WorkflowError> {
        Ok(Searching {
            topic: Topic::parse(raw_topic)?,
        })
    }
}

impl Searching {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The search call returned. An empty list is still a success: the run
    /// extracts nothing and completes with an empty synthesis.
    pub fn found(self, sources: Vec<SearchResult>) -> Extracting {
        Extracting {
            topic: self.topic,
            sources,
        }
    }

    /// The search failed for good. The only way into `Failed`.
    pub fn fail(self, error: SearchError) -> Failed {
        let error = match error {
            SearchError::EmptyQuery => WorkflowError::InvalidTopic(error.to_string()),
            SearchError::Cancelled => WorkflowError::Cancelled,
            SearchError::SearchUnavailable { .. } | SearchError::Provider { .. } => {
                WorkflowError::SearchUnavailable(error.to_string())
            }
        };
        Failed {
            topic: self.topic,
            error,
        }
    }

    pub fn cancel(self) -> Cancelled {
        Cancelled {
            topic: self.topic,
            from: Self::PHASE,
        }
    }
}

impl Extracting {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Sources in search rank order.
    pub fn sources(&self) -> &[SearchResult] {
        &self.sources
    }

    /// Every source has been attempted. `documents` must be in source order;
    /// failed documents become partial failures in that same order.
    pub fn extracted(self, documents: Vec<ExtractedDocument>) -> Synthesizing {
        let partial_failures = documents
            .iter()
            .filter(|d| !d.success)
            .map(|d| PartialFailure {
                url: d.source_url.clone(),
                reason: d
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "extraction failed".into()),
            })
            .collect();
        Synthesizing {
            topic: self.topic,
            sources: self.sources,
            documents,
            partial_failures,
        }
    }

    pub fn cancel(self) -> Cancelled {
        Cancelled {
            topic: self.topic,
            from: Self::PHASE,
        }
    }
}

impl Synthesizing {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn documents(&self) -> &[ExtractedDocument] {
        &self.documents
    }

    pub fn partial_failures(&self) -> &[PartialFailure] {
        &self.partial_failures
    }

    /// Synthesis always succeeds; a degraded result is still a result.
    /// `elapsed` is the wall time of the whole run.
    pub fn complete(
        self,
        run_id: impl Into<String>,
        synthesis: SynthesisResult,
        elapsed: Duration,
    ) -> Completed {
        let metadata = RunMetadata {
            completed_at: Utc::now(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            source_count: self.sources.len(),
            failure_count: self.partial_failures.len(),
        };
        Completed {
            result: WorkflowResult {
                run_id: run_id.into(),
                topic: self.topic.to_string(),
                sources: self.sources,
                synthesis,
                partial_failures: self.partial_failures,
                metadata,
            },
        }
    }

    pub fn cancel(self) -> Cancelled {
        Cancelled {
            topic: self.topic,
            from: Self::PHASE,
        }
    }
}

impl Completed {
    pub fn result(&self) -> &WorkflowResult {
        &self.result
    }

    pub fn into_result(self) -> WorkflowResult {
        self.result
    }
}

impl Failed {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn error(&self) -> &WorkflowError {
        &self.error
    }

    pub fn into_error(self) -> WorkflowError {
        self.error
    }
}

impl Cancelled {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The state the run was in when the token fired.
    pub fn from(&self) -> WorkflowPhase {
        self.from
    }

    pub fn into_error(self) -> WorkflowError {
        WorkflowError::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchResult {
        SearchResult {
            title: url.into(),
            url: url.into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn blank_topic_stays_idle() {
        let err = Idle.start("  \t").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTopic(_)));
    }

    #[test]
    fn happy_path_reaches_completed() {
        let searching = Idle.start(" rust ownership ").unwrap();
        assert_eq!(searching.phase(), WorkflowPhase::Searching);
        assert_eq!(searching.topic().as_str(), "rust ownership");

        let extracting = searching.found(vec![hit("https://a.example"), hit("https://b.example")]);
        assert_eq!(extracting.sources().len(), 2);

        let synthesizing = extracting.extracted(vec![
            ExtractedDocument::succeeded("https://a.example", None, "text".into()),
            ExtractedDocument::failed("https://b.example", "HTTP 404"),
        ]);
        assert_eq!(
            synthesizing.partial_failures(),
            [PartialFailure {
                url: "https://b.example".into(),
                reason: "HTTP 404".into(),
            }]
        );

        let completed =
            synthesizing.complete("run_1", SynthesisResult::default(), Duration::from_millis(2_500));
        assert_eq!(completed.phase(), WorkflowPhase::Completed);
        let result = completed.into_result();
        assert_eq!(result.run_id, "run_1");
        assert_eq!(result.topic, "rust ownership");
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.partial_failures.len(), 1);
        assert_eq!(result.metadata.duration_ms, 2_500);
        assert_eq!(result.metadata.source_count, 2);
        assert_eq!(result.metadata.failure_count, 1);
    }

    #[test]
    fn search_failures_map_to_workflow_errors() {
        let failed = Idle.start("x").unwrap().fail(SearchError::SearchUnavailable {
            attempts: 3,
            reason: "refused".into(),
        });
        assert_eq!(failed.phase(), WorkflowPhase::Failed);
        match failed.into_error() {
            WorkflowError::SearchUnavailable(msg) => assert!(msg.contains("3 attempt")),
            other => panic!("expected SearchUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn cancel_remembers_origin() {
        let cancelled = Idle.start("x").unwrap().found(vec![]).cancel();
        assert_eq!(cancelled.from(), WorkflowPhase::Extracting);
        assert_eq!(cancelled.into_error(), WorkflowError::Cancelled);
    }
}
