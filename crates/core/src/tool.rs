//! Tool invocation domain types and the tier-1 manual executor trait.
//!
//! A [`ToolCall`] is what the extractor parses out of the model stream; a
//! [`ToolResult`] is what the dispatcher hands back. [`ToolExecutionConfig`]
//! is the per-tenant configuration governing tier 2 of the execution policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A request to execute a tool, parsed from the model's streamed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value (an object in the well-formed case)
    pub parameters: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Canonical identity of this call, used for within-turn deduplication.
    ///
    /// Two calls with the same name and structurally equal parameters map
    /// to the same key regardless of object key order in the model output.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.name, canonical_json(&self.parameters))
    }
}

/// Serialize a JSON value with recursively sorted object keys.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => other.to_string(),
    }
}

/// The result of a tool execution. Produced exactly once per accepted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Where a tenant-configured tool executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMode {
    /// Served by the built-in platform registry.
    Platform,
    /// Proxied to a tenant-operated HTTP endpoint.
    Customer,
}

/// Per-tool tenant configuration. Governs tier 2 of the execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionConfig {
    /// Whether the tool may run at all.
    #[serde(default = "d_true")]
    pub is_enabled: bool,

    /// PLATFORM or CUSTOMER.
    pub execution_mode: ExecutionMode,

    /// Tenant endpoint, required for CUSTOMER mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_endpoint: Option<String>,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,

    /// Additional attempts after the first failure.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
}

impl Default for ToolExecutionConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            execution_mode: ExecutionMode::Platform,
            customer_endpoint: None,
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_timeout_ms() -> u64 {
    20_000
}
fn d_max_retries() -> u32 {
    1
}

/// A caller-supplied executor, registered under a tool name (tier 1).
///
/// Takes priority over tenant configuration and built-ins. Errors are
/// caught at the dispatcher boundary and converted to failed results.
#[async_trait]
pub trait ManualToolExecutor: Send + Sync {
    async fn execute(
        &self,
        parameters: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}
