//! Summarization collaborator, used only by the memory store.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::Message;

/// Produces a single summary covering a slice of messages.
///
/// The memory store supplies instruction text alongside the messages; when
/// a prior summary is among them, the instructions say to merge its content
/// with the new material rather than discard it.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        messages: &[Message],
        instructions: &str,
    ) -> std::result::Result<String, MemoryError>;
}
