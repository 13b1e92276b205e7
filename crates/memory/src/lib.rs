//! Conversation memory for Riptide.
//!
//! A per-session append-only message log with a zero-latency in-process
//! cache, best-effort replication to a durable backend, and size/token
//! triggered compaction through an external summarizer.

pub mod config;
pub mod store;
pub mod token;

pub use config::CompactionConfig;
pub use store::ConversationStore;
pub use token::{estimate_message_tokens, estimate_messages_tokens};
