//! Durable backend trait — the remote persistence collaborator.
//!
//! The engine treats persistence as best-effort replication: appends hit
//! the in-process cache synchronously and propagate here on a spawned task.
//! The backend also fronts the tool-specific search and generation
//! endpoints used by the built-in platform tools.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::{Message, SessionId};

/// One model call's trace: inputs, full output, and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// The session this turn belonged to.
    pub session_id: SessionId,

    /// The messages sent to the model.
    pub input: Vec<Message>,

    /// The full concatenated output text.
    pub output: String,

    /// Which model produced the output.
    pub model: String,

    /// Wall-clock latency of the model call.
    pub latency_ms: u64,

    /// Terminal status of the turn ("ok", "error", "aborted").
    pub status: String,

    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
}

/// A caller-supplied sink for trace records. When none is supplied the
/// orchestrator falls back to [`DurableBackend::save_trace`].
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, trace: TraceRecord) -> std::result::Result<(), BackendError>;
}

/// The durable persistence collaborator.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Persist one message. Called fire-and-forget per append.
    async fn save_message(
        &self,
        session: &SessionId,
        message: &Message,
    ) -> std::result::Result<(), BackendError>;

    /// Fetch the full message log for a session (cache-miss path).
    async fn get_messages(
        &self,
        session: &SessionId,
    ) -> std::result::Result<Vec<Message>, BackendError>;

    /// Persist a model-call trace.
    async fn save_trace(&self, trace: TraceRecord) -> std::result::Result<(), BackendError>;

    /// Knowledge-base search endpoint (built-in `knowledge_search` tool).
    async fn search_knowledge(
        &self,
        query: &str,
    ) -> std::result::Result<serde_json::Value, BackendError>;

    /// Product catalog search endpoint (built-in `product_search` tool).
    async fn search_products(
        &self,
        query: &str,
    ) -> std::result::Result<serde_json::Value, BackendError>;

    /// Page generation endpoint (built-in `generate_page` tool).
    async fn generate_page(
        &self,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, BackendError>;
}
