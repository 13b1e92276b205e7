//! # Riptide Core
//!
//! Domain types, collaborator traits, and error definitions for the Riptide
//! agent turn-orchestration engine. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model transport, durable backend, prompt
//! builder, summarizer, action dispatcher) is defined as a trait here.
//! Implementations live with the applications that embed the engine. This
//! enables:
//! - Swapping collaborators via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod backend;
pub mod error;
pub mod message;
pub mod prompt;
pub mod stream;
pub mod summarizer;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use action::ActionDispatcher;
pub use backend::{DurableBackend, TraceRecord, TraceSink};
pub use error::{BackendError, Error, MemoryError, Result, StreamError, ToolError};
pub use message::{CompactedMemory, ContentPart, Message, MessageContent, Role, SessionId};
pub use prompt::{PromptBuilder, SessionContext};
pub use stream::ModelStream;
pub use summarizer::Summarizer;
pub use tool::{ExecutionMode, ManualToolExecutor, ToolCall, ToolExecutionConfig, ToolResult};
