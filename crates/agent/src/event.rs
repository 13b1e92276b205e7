//! Lifecycle events emitted by the orchestrator.
//!
//! One `execute` call produces a finite, non-restartable sequence of these
//! events over an mpsc channel; consumers subscribe before invocation. A
//! gateway can forward them to clients over SSE or WebSocket unchanged.

use riptide_core::tool::ToolResult;
use serde::{Deserialize, Serialize};

/// Why an error event terminated (or interrupted) an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// Cancellation was requested via `abort()`.
    Aborted,
    /// The configured turn ceiling was reached without completion.
    TurnLimit,
    /// The model stream or a backend call failed.
    Transport,
    /// Anything else caught at the orchestrator boundary.
    Internal,
}

/// Events emitted by the agent during an execution.
///
/// - `text_delta`         — incremental visible text from the model
/// - `tool_call_detected` — a tool invocation was parsed from the stream
/// - `tool_result`        — a tool finished executing
/// - `error`              — terminal failure (aborted / turn limit / transport)
/// - `done`               — the loop completed normally
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Partial visible text from the model.
    TextDelta { content: String },

    /// A tool call was parsed out of the model stream.
    ToolCallDetected {
        name: String,
        parameters: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult { name: String, result: ToolResult },

    /// A terminal error. Exactly one terminal event per execution.
    Error {
        message: String,
        reason: ErrorReason,
    },

    /// The loop completed — final metadata.
    Done {
        session_id: String,
        turns: u32,
        tool_calls_made: usize,
    },
}

impl AgentEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallDetected { .. } => "tool_call_detected",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// Whether this event ends the execution's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}
