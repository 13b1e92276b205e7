//! Model streaming transport trait.
//!
//! A [`ModelStream`] knows how to send an ordered message sequence to an
//! LLM and hand back incremental text fragments. The orchestrator never
//! talks to a provider directly — pure polymorphism, like every other
//! collaborator seam in this crate.

use async_trait::async_trait;

use crate::error::StreamError;
use crate::message::Message;

/// The model streaming transport.
///
/// Returns a channel of incremental text fragments; the channel closing is
/// the end-of-stream signal. Dropping the receiver cancels consumption,
/// which is how the orchestrator stops reading after an abort.
#[async_trait]
pub trait ModelStream: Send + Sync {
    /// A human-readable name for this transport (e.g. "openai", "mock").
    fn name(&self) -> &str;

    /// Begin streaming a completion for the given messages and model.
    async fn stream(
        &self,
        messages: Vec<Message>,
        model: &str,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<String, StreamError>>,
        StreamError,
    >;
}
