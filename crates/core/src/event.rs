//! Domain event system: decoupled observation of research runs.
//!
//! The workflow publishes state transitions and tool outcomes; the CLI
//! and tests subscribe without the workflow knowing who listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::tool::ToolKind;

/// The states a research run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Searching,
    Extracting,
    Synthesizing,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Completed | WorkflowPhase::Failed | WorkflowPhase::Cancelled
        )
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Searching => "searching",
            WorkflowPhase::Extracting => "extracting",
            WorkflowPhase::Synthesizing => "synthesizing",
            WorkflowPhase::Completed => "completed",
            WorkflowPhase::Failed => "failed",
            WorkflowPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run moved between states
    WorkflowStateChanged {
        run_id: String,
        from: WorkflowPhase,
        to: WorkflowPhase,
        timestamp: DateTime<Utc>,
    },

    /// A tool finished (after its own retries)
    ToolExecuted {
        run_id: String,
        tool: ToolKind,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Conversation memory evicted entries
    MemoryPruned {
        evicted: usize,
        total_tokens: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
