//! Research workflow for DeepBrief.
//!
//! [`ResearchWorkflow`] moves a topic through an explicit state machine:
//!
//! ```text
//! Idle → Searching → Extracting → Synthesizing → Completed
//!            │            │             │
//!            ▼            └──────┬──────┘
//!          Failed             Cancelled
//! ```
//!
//! `Failed` is reachable only from `Searching`: once sources exist, every
//! later problem degrades into partial failures or an empty synthesis.

pub mod runner;
pub mod state;
pub mod summarizer;

pub use runner::ResearchWorkflow;
pub use summarizer::BriefSummarizer;
