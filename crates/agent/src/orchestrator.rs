//! The turn-loop orchestrator.
//!
//! Supervises the whole cycle: prompt assembly → model stream → extraction
//! → tool dispatch → memory writes → next turn. It is the error boundary
//! for the loop: nothing thrown by a collaborator escapes `execute`;
//! everything becomes a lifecycle event.
//!
//! Within one session, turns are strictly sequential: turn n+1 never starts
//! before turn n's memory appends complete. Within one turn, tool calls run
//! concurrently but their result messages and events land in the stable
//! order the calls were detected.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::future::join_all;
use riptide_core::backend::{DurableBackend, TraceRecord, TraceSink};
use riptide_core::error::Error;
use riptide_core::message::Message;
use riptide_core::prompt::{PromptBuilder, SessionContext};
use riptide_core::stream::ModelStream;
use riptide_core::tool::ToolCall;
use riptide_memory::ConversationStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch::ToolDispatcher;
use crate::event::{AgentEvent, ErrorReason};
use crate::extractor::ToolCallExtractor;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum turns per `execute` call.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,

    /// Event channel capacity.
    #[serde(default = "d_event_buffer")]
    pub event_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: d_max_turns(),
            event_buffer: d_event_buffer(),
        }
    }
}

fn d_max_turns() -> u32 {
    10
}
fn d_event_buffer() -> usize {
    64
}

/// The agent turn loop.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    transport: Arc<dyn ModelStream>,
    prompt_builder: Arc<dyn PromptBuilder>,
    dispatcher: Arc<ToolDispatcher>,
    backend: Arc<dyn DurableBackend>,
    trace_sink: Option<Arc<dyn TraceSink>>,
    config: OrchestratorConfig,
    /// Cancellation token for the in-flight execution.
    cancelled: AtomicBool,
    /// Whether an execution is in flight (one per instance).
    running: AtomicBool,
    /// Set once `init` has warmed the cache.
    initialized: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        transport: Arc<dyn ModelStream>,
        prompt_builder: Arc<dyn PromptBuilder>,
        dispatcher: Arc<ToolDispatcher>,
        backend: Arc<dyn DurableBackend>,
    ) -> Self {
        Self {
            store,
            transport,
            prompt_builder,
            dispatcher,
            backend,
            trace_sink: None,
            config: OrchestratorConfig::default(),
            cancelled: AtomicBool::new(false),
            running: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    /// Route trace records to a caller-supplied sink instead of the backend.
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Warm the session cache from the durable backend. Idempotent:
    /// repeated calls after the first are no-ops.
    pub async fn init(&self, ctx: &SessionContext) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.store.read_or_fetch(&ctx.session_id).await;
    }

    /// Request cancellation of the in-flight execution.
    ///
    /// Already-started tool executions are not forcibly cancelled; their
    /// results, if they complete, are still recorded.
    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cached messages for a session (no I/O).
    pub async fn cached_messages(&self, ctx: &SessionContext) -> Vec<Message> {
        self.store.read_cached(&ctx.session_id).await
    }

    /// Compacted summaries accumulated for a session.
    pub async fn compacted_memories(
        &self,
        ctx: &SessionContext,
    ) -> Vec<riptide_core::message::CompactedMemory> {
        self.store.compacted(&ctx.session_id).await
    }

    /// Run the turn loop for one user query.
    ///
    /// Returns the lifecycle event stream; the loop itself runs on a
    /// spawned task. Only one execution may be in flight per instance —
    /// a second call while one is running fails with [`Error::Busy`]
    /// without touching the active cancellation token.
    pub fn execute(
        self: &Arc<Self>,
        ctx: SessionContext,
        query: impl Into<String>,
    ) -> Result<mpsc::Receiver<AgentEvent>, Error> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Busy);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let this = Arc::clone(self);
        let query = query.into();
        tokio::spawn(async move {
            this.run(ctx, query, tx).await;
            this.running.store(false, Ordering::SeqCst);
        });
        Ok(rx)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn emit(&self, tx: &mpsc::Sender<AgentEvent>, event: AgentEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = tx.send(event).await;
    }

    async fn emit_terminal(
        &self,
        tx: &mpsc::Sender<AgentEvent>,
        message: impl Into<String>,
        reason: ErrorReason,
    ) {
        self.emit(
            tx,
            AgentEvent::Error {
                message: message.into(),
                reason,
            },
        )
        .await;
    }

    async fn run(&self, ctx: SessionContext, query: String, tx: mpsc::Sender<AgentEvent>) {
        info!(session = %ctx.session_id, model = %ctx.model, "Starting execution");

        self.store
            .append(&ctx.session_id, Message::user(query))
            .await;

        let mut tool_calls_made = 0usize;

        for turn in 1..=self.config.max_turns {
            if self.is_cancelled() {
                self.emit_terminal(&tx, "aborted", ErrorReason::Aborted).await;
                return;
            }

            debug!(session = %ctx.session_id, turn, "Turn starting");

            // Prompt assembly (pure read of memory state).
            let history = self.store.read_cached(&ctx.session_id).await;
            let summaries = self.store.compacted(&ctx.session_id).await;
            let prompt = match self
                .prompt_builder
                .build_prompt(&ctx, &history, &summaries)
                .await
            {
                Ok(prompt) => prompt,
                Err(e) => {
                    self.emit_terminal(
                        &tx,
                        format!("Prompt assembly failed: {e}"),
                        ErrorReason::Internal,
                    )
                    .await;
                    return;
                }
            };

            // Model stream through the extractor.
            let started = std::time::Instant::now();
            let mut fragments = match self.transport.stream(prompt.clone(), &ctx.model).await {
                Ok(rx) => rx,
                Err(e) => {
                    self.emit_terminal(
                        &tx,
                        format!("Model request failed: {e}"),
                        ErrorReason::Transport,
                    )
                    .await;
                    return;
                }
            };

            let mut extractor = ToolCallExtractor::new();
            let mut full_text = String::new();
            let mut turn_calls: Vec<ToolCall> = Vec::new();
            let mut suppress_text = false;
            let mut aborted_mid_stream = false;
            let mut stream_failure: Option<String> = None;

            while let Some(item) = fragments.recv().await {
                // Mid-turn cancellation: stop consuming the stream. Dropping
                // the receiver below tells the transport to stop producing.
                if self.is_cancelled() {
                    aborted_mid_stream = true;
                    break;
                }

                let fragment = match item {
                    Ok(fragment) => fragment,
                    Err(e) => {
                        stream_failure = Some(e.to_string());
                        break;
                    }
                };

                full_text.push_str(&fragment);
                let extracted = extractor.push(&fragment);

                if !extracted.tool_calls.is_empty() {
                    // Once any tool call appears, no further text is
                    // forwarded for the remainder of the turn.
                    suppress_text = true;
                    for call in extracted.tool_calls {
                        self.emit(
                            &tx,
                            AgentEvent::ToolCallDetected {
                                name: call.name.clone(),
                                parameters: call.parameters.clone(),
                            },
                        )
                        .await;
                        turn_calls.push(call);
                    }
                }

                if !suppress_text && !extracted.text.is_empty() {
                    self.emit(
                        &tx,
                        AgentEvent::TextDelta {
                            content: extracted.text,
                        },
                    )
                    .await;
                }
            }
            drop(fragments);

            let leftover = extractor.flush();
            if !suppress_text && !aborted_mid_stream && stream_failure.is_none()
                && !leftover.is_empty()
            {
                self.emit(&tx, AgentEvent::TextDelta { content: leftover }).await;
            }

            // Trace the model call; a persistence failure never fails the turn.
            let status = if aborted_mid_stream {
                "aborted"
            } else if stream_failure.is_some() {
                "error"
            } else {
                "ok"
            };
            let trace = TraceRecord {
                session_id: ctx.session_id.clone(),
                input: prompt,
                output: full_text.clone(),
                model: ctx.model.clone(),
                latency_ms: started.elapsed().as_millis() as u64,
                status: status.to_string(),
                timestamp: Utc::now(),
            };
            let persisted = match &self.trace_sink {
                Some(sink) => sink.record(trace).await,
                None => self.backend.save_trace(trace).await,
            };
            if let Err(e) = persisted {
                warn!(session = %ctx.session_id, error = %e, "Trace persistence failed");
            }

            // The full concatenated response is appended whether or not it
            // produced tool calls, even when empty or cut short, so turn
            // structure in memory stays 1:1 with model calls.
            self.store
                .append(&ctx.session_id, Message::assistant(full_text))
                .await;

            if aborted_mid_stream {
                self.emit_terminal(&tx, "aborted", ErrorReason::Aborted).await;
                return;
            }
            if let Some(failure) = stream_failure {
                self.emit_terminal(
                    &tx,
                    format!("Model stream failed: {failure}"),
                    ErrorReason::Transport,
                )
                .await;
                return;
            }

            if turn_calls.is_empty() {
                info!(session = %ctx.session_id, turn, "Execution complete");
                self.emit(
                    &tx,
                    AgentEvent::Done {
                        session_id: ctx.session_id.to_string(),
                        turns: turn,
                        tool_calls_made,
                    },
                )
                .await;
                return;
            }

            // Deduplicate by structural (name, parameters) identity,
            // preserving first-seen order.
            let mut seen = HashSet::new();
            let unique: Vec<ToolCall> = turn_calls
                .into_iter()
                .filter(|call| seen.insert(call.dedup_key()))
                .collect();

            // Cancellation between the stream and dispatch: start nothing new.
            if self.is_cancelled() {
                self.emit_terminal(&tx, "aborted", ErrorReason::Aborted).await;
                return;
            }

            debug!(
                session = %ctx.session_id,
                turn,
                calls = unique.len(),
                "Executing tool calls"
            );

            // Concurrent execution; `join_all` yields results in the stable
            // detection order regardless of completion order.
            let results = join_all(unique.iter().map(|call| self.dispatcher.dispatch(call))).await;
            tool_calls_made += unique.len();

            for (call, result) in unique.iter().zip(results) {
                let serialized = serde_json::to_string(&result)
                    .unwrap_or_else(|_| r#"{"success":false}"#.to_string());
                self.store
                    .append(
                        &ctx.session_id,
                        Message::system(format!("Tool '{}' returned: {serialized}", call.name)),
                    )
                    .await;
                self.emit(
                    &tx,
                    AgentEvent::ToolResult {
                        name: call.name.clone(),
                        result,
                    },
                )
                .await;
            }
            // Tool-producing turns never terminate the loop.
        }

        self.emit_terminal(
            &tx,
            format!("Turn limit reached after {} turns", self.config.max_turns),
            ErrorReason::TurnLimit,
        )
        .await;
    }
}
