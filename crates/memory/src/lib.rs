//! Conversation memory for DeepBrief.
//!
//! A bounded, session-scoped arena of past research briefs. Nothing here
//! touches durable storage: memory lives as long as the session that owns
//! it.

pub mod conversation;
pub mod token;

pub use conversation::{ConversationMemory, MemoryEntry, SharedMemory};
pub use token::estimate_tokens;
