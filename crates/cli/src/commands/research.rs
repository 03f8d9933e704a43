//! `deepbrief research`: Run the research workflow from the terminal.
//!
//! Topics run one after another in a single session, so later briefs can
//! draw on the memory of earlier ones. Ctrl-C cancels the run in flight.

use std::fmt::Write as _;
use std::sync::Arc;

use deepbrief_config::AppConfig;
use deepbrief_core::error::WorkflowError;
use deepbrief_core::event::{DomainEvent, EventBus, WorkflowPhase};
use deepbrief_core::research::WorkflowResult;
use deepbrief_workflow::ResearchWorkflow;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn run(
    topics: Vec<String>,
    max_sources: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let event_bus = Arc::new(EventBus::default());
    let workflow = ResearchWorkflow::from_config(&config, event_bus.clone())?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    if !json {
        tokio::spawn(report_progress(event_bus));
    }

    for topic in &topics {
        let result = workflow
            .run_limited(topic, max_sources, cancel.child_token())
            .await;

        match result {
            Ok(result) if json => println!("{}", serde_json::to_string_pretty(&result)?),
            Ok(result) => print!("{}", render_brief(&result)?),
            Err(WorkflowError::Cancelled) => {
                eprintln!("  Cancelled.");
                return Err(WorkflowError::Cancelled.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => cancel.cancel(),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}

/// Print one line per phase while a run progresses.
async fn report_progress(event_bus: Arc<EventBus>) {
    let mut rx = event_bus.subscribe();
    while let Ok(event) = rx.recv().await {
        if let DomainEvent::WorkflowStateChanged { to, .. } = event.as_ref() {
            let line = match to {
                WorkflowPhase::Searching => "  Searching the web...",
                WorkflowPhase::Extracting => "  Reading sources...",
                WorkflowPhase::Synthesizing => "  Synthesizing...",
                _ => continue,
            };
            eprintln!("{line}");
        }
    }
}

/// Human-readable brief: summary, key points, sources, failures.
fn render_brief(result: &WorkflowResult) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out)?;
    writeln!(out, "# {}", result.topic)?;
    writeln!(out)?;

    if let Some(summary) = &result.synthesis.summary {
        writeln!(out, "{summary}\n")?;
    }

    if result.synthesis.key_points.is_empty() {
        writeln!(out, "No key points could be extracted.")?;
    } else {
        writeln!(out, "## Key points")?;
        for point in &result.synthesis.key_points {
            writeln!(out, "- {point}")?;
        }
    }
    writeln!(out)?;

    if !result.sources.is_empty() {
        writeln!(out, "## Sources")?;
        for (i, source) in result.sources.iter().enumerate() {
            writeln!(out, "{}. {} <{}>", i + 1, source.title, source.url)?;
        }
        writeln!(out)?;
    }

    if !result.partial_failures.is_empty() {
        writeln!(out, "## Unavailable sources")?;
        for failure in &result.partial_failures {
            writeln!(out, "- {}: {}", failure.url, failure.reason)?;
        }
        writeln!(out)?;
    }

    let meta = &result.metadata;
    writeln!(
        out,
        "_{} sources, {} unavailable, {:.1}s, completed {}_",
        meta.source_count,
        meta.failure_count,
        meta.duration_ms as f64 / 1000.0,
        meta.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )?;

    Ok(out)
}
