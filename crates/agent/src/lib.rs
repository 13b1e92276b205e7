//! The Riptide turn loop — the heart of the engine.
//!
//! Each `execute` call drives a bounded multi-turn cycle:
//!
//! 1. **Assemble** the prompt from cached memory and compacted summaries
//! 2. **Stream** the model response through the tool-call extractor
//! 3. **If tool calls**: dedupe, execute under the 3-tier priority policy,
//!    record results, loop back to step 1
//! 4. **If text only**: emit completion, loop ends
//!
//! The loop continues until completion, the turn limit, or cancellation.

pub mod dispatch;
pub mod event;
pub mod extractor;
pub mod orchestrator;

pub use dispatch::{CustomerTransport, HttpCustomerTransport, ToolDispatcher};
pub use event::{AgentEvent, ErrorReason};
pub use extractor::{Extracted, ToolCallExtractor};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
