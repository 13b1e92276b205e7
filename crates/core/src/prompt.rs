//! Prompt assembly collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::{CompactedMemory, Message, SessionId};

/// Per-execution context handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    /// The session being driven.
    pub session_id: SessionId,

    /// The owning user.
    pub user_id: String,

    /// Model identifier for this execution.
    pub model: String,

    /// Optional active skill or task context injected into the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

/// Assembles the ordered message sequence sent to the model each turn.
///
/// A pure read: the builder sees the current cached history and compacted
/// summaries but never mutates them. Prompt templating itself lives with
/// the embedding application.
#[async_trait]
pub trait PromptBuilder: Send + Sync {
    async fn build_prompt(
        &self,
        ctx: &SessionContext,
        history: &[Message],
        summaries: &[CompactedMemory],
    ) -> std::result::Result<Vec<Message>, Error>;
}
