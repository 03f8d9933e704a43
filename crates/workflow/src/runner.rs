//! The research orchestrator.
//!
//! Drives one topic through search, extraction and synthesis, publishing
//! each state change on the event bus. Search and synthesis are strictly
//! sequential around the extraction phase; extraction runs with bounded
//! concurrency and gathers its documents in search rank order.

use std::sync::Arc;

use chrono::Utc;
use deepbrief_config::AppConfig;
use deepbrief_core::error::{SearchError, WorkflowError};
use deepbrief_core::event::{DomainEvent, EventBus, WorkflowPhase};
use deepbrief_core::research::{ExtractedDocument, SearchResult, SynthesisResult, WorkflowResult};
use deepbrief_core::retry::RetryError;
use deepbrief_core::tool::ToolKind;
use deepbrief_memory::{ConversationMemory, MemoryEntry, SharedMemory};
use deepbrief_tools::ToolSet;
use futures::StreamExt;
use futures::stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{Cancelled, Idle, State, Synthesizing};
use crate::summarizer::BriefSummarizer;

const DEFAULT_CONCURRENCY: usize = 4;

/// Outcome of the optional LLM brief.
enum Brief {
    Written(String),
    Skipped,
    Cancelled,
}

pub struct ResearchWorkflow {
    tools: Arc<ToolSet>,
    memory: SharedMemory,
    summarizer: Option<Arc<BriefSummarizer>>,
    events: Arc<EventBus>,
    concurrency: usize,
}

impl ResearchWorkflow {
    /// A workflow with a fresh session memory and no LLM brief.
    pub fn new(tools: Arc<ToolSet>, memory: SharedMemory, events: Arc<EventBus>) -> Self {
        Self {
            tools,
            memory,
            summarizer: None,
            events,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Wire tools, memory and the optional summarizer from configuration.
    ///
    /// The summarizer is only built when an LLM key (or a local provider)
    /// is configured.
    pub fn from_config(config: &AppConfig, events: Arc<EventBus>) -> deepbrief_core::Result<Self> {
        let tools = Arc::new(ToolSet::from_config(&config.tools)?);
        let memory = ConversationMemory::from_config(&config.memory)
            .with_events(events.clone())
            .shared();

        let mut workflow = Self::new(tools, memory, events)
            .with_concurrency(config.tools.content_extractor.concurrency);

        match deepbrief_providers::build_from_config(config)? {
            Some(provider) => {
                info!(provider = provider.name(), model = config.llm_model(), "LLM brief enabled");
                let summarizer =
                    BriefSummarizer::new(provider, &config.agents).with_model(config.llm_model());
                workflow = workflow.with_summarizer(summarizer);
            }
            None => info!("No LLM key configured, briefs will use key points only"),
        }
        Ok(workflow)
    }

    /// Maximum number of extractions in flight. Values below 1 become 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_summarizer(mut self, summarizer: BriefSummarizer) -> Self {
        self.summarizer = Some(Arc::new(summarizer));
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Research `topic` to completion.
    pub async fn run(&self, topic: &str) -> Result<WorkflowResult, WorkflowError> {
        self.run_with_cancel(topic, CancellationToken::new()).await
    }

    /// Research `topic`; firing `cancel` ends the run as `Cancelled`.
    pub async fn run_with_cancel(
        &self,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        self.run_limited(topic, None, cancel).await
    }

    /// Like [`run_with_cancel`](Self::run_with_cancel), with the number of
    /// sources capped at `max_sources` instead of the configured limit.
    pub async fn run_limited(
        &self,
        topic: &str,
        max_sources: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        let searching = Idle.start(topic)?;
        let run_id = format!("run_{}", Uuid::new_v4().simple());
        let started = Instant::now();
        info!(run_id = %run_id, topic = %searching.topic(), "Research run started");
        self.transition(&run_id, WorkflowPhase::Idle, WorkflowPhase::Searching);

        // Searching
        let max_sources = max_sources
            .unwrap_or_else(|| self.tools.web_search.max_results())
            .max(1);
        let tool_started = Instant::now();
        let search = self
            .tools
            .web_search
            .search_limited(searching.topic().as_str(), max_sources, Some(&cancel))
            .await;
        self.tool_executed(&run_id, ToolKind::WebSearch, search.is_ok(), tool_started);

        let extracting = match search {
            Ok(sources) => searching.found(sources),
            Err(SearchError::Cancelled) => return Err(self.cancelled(&run_id, searching.cancel())),
            Err(e) => {
                let failed = searching.fail(e);
                warn!(run_id = %run_id, error = %failed.error(), "Research run failed");
                self.transition(&run_id, WorkflowPhase::Searching, failed.phase());
                return Err(failed.into_error());
            }
        };
        self.transition(&run_id, WorkflowPhase::Searching, WorkflowPhase::Extracting);

        // Extracting
        let documents = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            documents = self.extract_all(&run_id, extracting.sources(), &cancel) => Some(documents),
        };
        let Some(documents) = documents.filter(|_| !cancel.is_cancelled()) else {
            return Err(self.cancelled(&run_id, extracting.cancel()));
        };
        let synthesizing = extracting.extracted(documents);
        self.transition(&run_id, WorkflowPhase::Extracting, WorkflowPhase::Synthesizing);

        // Synthesizing
        let tool_started = Instant::now();
        let mut synthesis = self.tools.synthesizer.synthesize(synthesizing.documents());
        self.tool_executed(&run_id, ToolKind::ResearchSynthesizer, true, tool_started);

        match self.brief(&run_id, &synthesizing, &synthesis, &cancel).await {
            Brief::Written(summary) => synthesis.summary = Some(summary),
            Brief::Skipped => {}
            Brief::Cancelled => return Err(self.cancelled(&run_id, synthesizing.cancel())),
        }

        let topic = synthesizing.topic().to_string();
        let completed = synthesizing.complete(run_id.clone(), synthesis, started.elapsed());
        self.remember(&topic, &completed.result().synthesis).await;
        self.transition(&run_id, WorkflowPhase::Synthesizing, completed.phase());

        let result = completed.into_result();
        info!(
            run_id = %run_id,
            sources = result.sources.len(),
            key_points = result.synthesis.key_points.len(),
            partial_failures = result.partial_failures.len(),
            duration_ms = result.metadata.duration_ms,
            "Research run completed"
        );
        Ok(result)
    }

    /// Extract every source with bounded concurrency. `buffered` yields in
    /// input order, so the documents line up with the search ranking.
    async fn extract_all(
        &self,
        run_id: &str,
        sources: &[SearchResult],
        cancel: &CancellationToken,
    ) -> Vec<ExtractedDocument> {
        let extractor = &self.tools.content_extractor;
        let timeout = extractor.timeout();
        debug!(run_id, sources = sources.len(), concurrency = self.concurrency, "Extracting sources");

        // Owned URLs keep the stream free of higher-ranked borrows, so the
        // run future stays `Send`.
        let urls: Vec<String> = sources.iter().map(|s| s.url.clone()).collect();
        stream::iter(urls)
            .map(|url| async move {
                let started = Instant::now();
                let document = extractor
                    .extract_with_cancel(&url, timeout, Some(cancel))
                    .await;
                self.tool_executed(run_id, ToolKind::ContentExtractor, document.success, started);
                document
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Ask the LLM for a brief when one is configured and there is text to
    /// summarize. Any failure other than cancellation leaves the summary out.
    async fn brief(
        &self,
        run_id: &str,
        synthesizing: &Synthesizing,
        synthesis: &SynthesisResult,
        cancel: &CancellationToken,
    ) -> Brief {
        let Some(summarizer) = &self.summarizer else {
            return Brief::Skipped;
        };
        if synthesis.is_degraded() {
            return Brief::Skipped;
        }

        let context = self.memory.lock().await.render_context();
        match summarizer
            .summarize(synthesizing.topic(), synthesizing.documents(), &context, cancel)
            .await
        {
            Ok(summary) => Brief::Written(summary),
            Err(RetryError::Cancelled { .. }) => Brief::Cancelled,
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(run_id, attempts, error = %last, "LLM brief failed, keeping key points only");
                Brief::Skipped
            }
        }
    }

    /// Record the finished run in session memory.
    async fn remember(&self, topic: &str, synthesis: &SynthesisResult) {
        let summary = synthesis
            .summary
            .clone()
            .unwrap_or_else(|| synthesis.key_points.join(" "));
        let mut memory = self.memory.lock().await;
        memory.append(MemoryEntry::new(topic, summary));
        debug!(entries = memory.len(), total_tokens = memory.total_tokens(), "Run recorded in memory");
    }

    fn cancelled(&self, run_id: &str, cancelled: Cancelled) -> WorkflowError {
        info!(run_id, topic = %cancelled.topic(), during = %cancelled.from(), "Research run cancelled");
        self.transition(run_id, cancelled.from(), cancelled.phase());
        cancelled.into_error()
    }

    fn transition(&self, run_id: &str, from: WorkflowPhase, to: WorkflowPhase) {
        debug!(run_id, %from, %to, "State transition");
        self.events.publish(DomainEvent::WorkflowStateChanged {
            run_id: run_id.to_string(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn tool_executed(&self, run_id: &str, tool: ToolKind, success: bool, started: Instant) {
        self.events.publish(DomainEvent::ToolExecuted {
            run_id: run_id.to_string(),
            tool,
            success,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }
}
