//! Tool dispatch under the 3-tier priority policy.
//!
//! Per call, in order:
//! 1. a caller-registered manual executor for the name,
//! 2. a tenant-configured CUSTOMER-mode endpoint (timeout-bounded, retried
//!    with exponential backoff),
//! 3. the built-in platform registry,
//! with tenant custom tools falling back to the widget-action collaborator.
//!
//! The dispatcher is an error boundary: it always returns a [`ToolResult`],
//! never an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use riptide_core::action::ActionDispatcher;
use riptide_core::error::ToolError;
use riptide_core::tool::{
    ExecutionMode, ManualToolExecutor, ToolCall, ToolExecutionConfig, ToolResult,
};
use riptide_tools::BuiltinRegistry;
use tracing::{debug, warn};

/// Transport for invoking a tenant's CUSTOMER-mode endpoint.
///
/// A seam over the HTTP client so retry behavior is testable without a
/// network; production uses [`HttpCustomerTransport`].
#[async_trait]
pub trait CustomerTransport: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &str,
        call: &ToolCall,
        timeout: Duration,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// Default transport: POSTs `{name, parameters}` as JSON.
pub struct HttpCustomerTransport {
    client: reqwest::Client,
}

impl HttpCustomerTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCustomerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerTransport for HttpCustomerTransport {
    async fn invoke(
        &self,
        endpoint: &str,
        call: &ToolCall,
        timeout: Duration,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let response = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .json(&serde_json::json!({
                "name": call.name,
                "parameters": call.parameters,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                } else {
                    ToolError::ExecutionFailed {
                        tool_name: call.name.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: call.name.clone(),
                reason: format!("endpoint returned HTTP {status}"),
            });
        }

        // Non-JSON bodies are wrapped rather than rejected.
        let body = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: call.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&body)
            .unwrap_or_else(|_| serde_json::Value::String(body)))
    }
}

/// Resolves and executes tool calls for the orchestrator.
pub struct ToolDispatcher {
    manual: HashMap<String, Arc<dyn ManualToolExecutor>>,
    tenant_config: HashMap<String, ToolExecutionConfig>,
    custom_tools: HashSet<String>,
    builtins: BuiltinRegistry,
    transport: Arc<dyn CustomerTransport>,
    actions: Arc<dyn ActionDispatcher>,
}

impl ToolDispatcher {
    pub fn new(builtins: BuiltinRegistry, actions: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            manual: HashMap::new(),
            tenant_config: HashMap::new(),
            custom_tools: HashSet::new(),
            builtins,
            transport: Arc::new(HttpCustomerTransport::new()),
            actions,
        }
    }

    /// Swap the customer-endpoint transport (tests use a mock).
    pub fn with_transport(mut self, transport: Arc<dyn CustomerTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Register a tier-1 manual executor under a tool name.
    pub fn register_manual(
        &mut self,
        name: impl Into<String>,
        executor: Arc<dyn ManualToolExecutor>,
    ) {
        self.manual.insert(name.into(), executor);
    }

    /// Install per-tenant tool configuration (tier 2).
    pub fn set_tenant_config(&mut self, config: HashMap<String, ToolExecutionConfig>) {
        self.tenant_config = config;
    }

    /// Register a tenant custom tool name (widget-action fallback).
    pub fn register_custom_tool(&mut self, name: impl Into<String>) {
        self.custom_tools.insert(name.into());
    }

    /// Execute one call under the priority policy. Infallible by contract:
    /// every failure mode becomes a `success: false` result.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        // Tier 1: manual executor.
        if let Some(executor) = self.manual.get(&call.name) {
            debug!(tool = %call.name, "Dispatching to manual executor");
            return match executor.execute(call.parameters.clone()).await {
                Ok(value) => ToolResult::ok(value),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Manual executor failed");
                    ToolResult::fail(e.to_string())
                }
            };
        }

        // Tier 2: tenant CUSTOMER endpoint.
        if let Some(cfg) = self.tenant_config.get(&call.name) {
            if !cfg.is_enabled {
                return ToolResult::fail(ToolError::Disabled(call.name.clone()).to_string());
            }
            if cfg.execution_mode == ExecutionMode::Customer {
                if let Some(endpoint) = &cfg.customer_endpoint {
                    return self.invoke_customer(call, endpoint, cfg).await;
                }
            }
            // PLATFORM mode (or no endpoint) falls through to the registry.
        }

        // Tier 3: built-in platform registry.
        if let Some(tool) = self.builtins.get(&call.name) {
            return match tool.execute(call.parameters.clone()).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Built-in tool failed");
                    ToolResult::fail(e.to_string())
                }
            };
        }

        // Tenant custom tools delegate to the widget-action collaborator.
        if self.custom_tools.contains(&call.name) {
            debug!(tool = %call.name, "Dispatching custom tool to action collaborator");
            return match self
                .actions
                .perform_action(&call.name, call.parameters.clone())
                .await
            {
                Ok(value) => ToolResult::ok(value),
                Err(e) => ToolResult::fail(e.to_string()),
            };
        }

        ToolResult::fail(format!(
            "Unknown tool: {}. Available tools: {}",
            call.name,
            self.builtins.names().join(", ")
        ))
    }

    /// Invoke a CUSTOMER endpoint with `max_retries` additional attempts and
    /// exponentially increasing backoff (2^attempt seconds).
    async fn invoke_customer(
        &self,
        call: &ToolCall,
        endpoint: &str,
        cfg: &ToolExecutionConfig,
    ) -> ToolResult {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let mut attempt: u32 = 1;
        loop {
            match self.transport.invoke(endpoint, call, timeout).await {
                Ok(value) => return ToolResult::ok(value),
                Err(e) => {
                    if attempt > cfg.max_retries {
                        return ToolResult::fail(format!(
                            "Tool '{}' failed after {} attempts: {e}",
                            call.name, attempt
                        ));
                    }
                    let backoff = Duration::from_secs(1u64 << attempt.min(16));
                    warn!(
                        tool = %call.name,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Customer endpoint failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
