//! Bounded conversation memory.
//!
//! Entries are kept in insertion order. Every mutation ends with a prune:
//! expired entries go first, then the oldest entries until the token total
//! fits `max_token_limit`. A reader can never observe the memory over
//! budget.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deepbrief_config::MemoryConfig;
use deepbrief_core::error::MemoryError;
use deepbrief_core::event::{DomainEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::token::estimate_tokens;

/// Memory shared by the sequential runs of one session.
///
/// The mutex gives `append`/`prune` a single writer.
pub type SharedMemory = Arc<Mutex<ConversationMemory>>;

/// One remembered research brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub token_count: usize,
    pub summary: String,
}

impl MemoryEntry {
    /// Create an entry stamped now, sized by the token heuristic.
    pub fn new(topic: impl Into<String>, summary: impl Into<String>) -> Self {
        Self::at(topic, summary, Utc::now())
    }

    pub fn at(topic: impl Into<String>, summary: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let topic = topic.into();
        let summary = summary.into();
        let token_count = estimate_tokens(&topic) + estimate_tokens(&summary);
        Self {
            topic,
            timestamp,
            token_count,
            summary,
        }
    }
}

/// A token-budgeted, TTL-expiring arena of [`MemoryEntry`].
pub struct ConversationMemory {
    entries: VecDeque<MemoryEntry>,
    total_tokens: usize,
    max_token_limit: usize,
    ttl: Duration,
    events: Option<Arc<EventBus>>,
}

impl ConversationMemory {
    pub fn new(max_token_limit: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            total_tokens: 0,
            max_token_limit,
            ttl,
            events: None,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_token_limit, config.ttl())
    }

    /// Publish a `MemoryPruned` event whenever entries are evicted.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Wrap for sharing across the runs of one session.
    pub fn shared(self) -> SharedMemory {
        Arc::new(Mutex::new(self))
    }

    /// Append an entry, then prune.
    pub fn append(&mut self, entry: MemoryEntry) {
        self.append_at(entry, Utc::now());
    }

    /// Append with an explicit clock reading.
    pub fn append_at(&mut self, entry: MemoryEntry, now: DateTime<Utc>) {
        if entry.token_count > self.max_token_limit {
            warn!(
                topic = %entry.topic,
                token_count = entry.token_count,
                max_token_limit = self.max_token_limit,
                "Memory entry larger than the whole budget, it will be evicted"
            );
        }
        self.total_tokens += entry.token_count;
        self.entries.push_back(entry);
        self.prune_at(now);
    }

    /// Drop expired entries, then the oldest until under budget.
    /// Returns how many entries were evicted.
    pub fn prune(&mut self) -> usize {
        self.prune_at(Utc::now())
    }

    pub fn prune_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();

        let ttl = self.ttl;
        self.entries.retain(|entry| !is_expired(entry, now, ttl));
        let expired = before - self.entries.len();
        self.total_tokens = self.entries.iter().map(|e| e.token_count).sum();

        while self.total_tokens > self.max_token_limit {
            let Some(oldest) = self.entries.pop_front() else {
                break;
            };
            self.total_tokens -= oldest.token_count;
            debug!(topic = %oldest.topic, tokens = oldest.token_count, "Evicted oldest memory entry");
        }

        if let Err(e) = self.check_budget() {
            error!(error = %e, "Memory invariant violated, clearing");
            self.clear();
        }

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(
                expired,
                over_budget = evicted - expired,
                total_tokens = self.total_tokens,
                "Pruned conversation memory"
            );
            if let Some(events) = &self.events {
                events.publish(DomainEvent::MemoryPruned {
                    evicted,
                    total_tokens: self.total_tokens,
                    timestamp: now,
                });
            }
        }
        evicted
    }

    fn check_budget(&self) -> Result<(), MemoryError> {
        let recomputed: usize = self.entries.iter().map(|e| e.token_count).sum();
        if recomputed != self.total_tokens || recomputed > self.max_token_limit {
            return Err(MemoryError::MemoryOverflow {
                total_tokens: recomputed,
                max_token_limit: self.max_token_limit,
            });
        }
        Ok(())
    }

    /// All entries, oldest first.
    pub fn snapshot(&self) -> Vec<MemoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The `k` most recent entries, oldest first.
    pub fn recent(&self, k: usize) -> Vec<MemoryEntry> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Render the remembered briefs as prompt context for the LLM.
    pub fn render_context(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- {}: {}", e.topic, e.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_tokens = 0;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn max_token_limit(&self) -> usize {
        self.max_token_limit
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

/// Age strictly greater than the TTL. Entries stamped in the future are
/// never expired.
fn is_expired(entry: &MemoryEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
    (now - entry.timestamp)
        .to_std()
        .is_ok_and(|age| age > ttl)
}
