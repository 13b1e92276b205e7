//! Built-in platform tools for Riptide.
//!
//! These form tier 3 of the execution policy: fixed capabilities every
//! tenant gets, backed by the durable backend's search/generation endpoints
//! and the DOM action collaborator.

pub mod dom_action;
pub mod knowledge_search;
pub mod page_generator;
pub mod product_search;

pub use dom_action::{DomActionTool, DOM_ACTIONS};
pub use knowledge_search::KnowledgeSearchTool;
pub use page_generator::PageGeneratorTool;
pub use product_search::ProductSearchTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use riptide_core::action::ActionDispatcher;
use riptide_core::backend::DurableBackend;
use riptide_core::error::ToolError;
use riptide_core::tool::ToolResult;

/// A built-in platform tool.
#[async_trait]
pub trait BuiltinTool: Send + Sync {
    /// The unique name of this tool (e.g. "product_search").
    fn name(&self) -> &str;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        parameters: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;
}

/// The fixed registry of platform tools.
pub struct BuiltinRegistry {
    tools: HashMap<String, Box<dyn BuiltinTool>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The standard registry: knowledge search, product search, page
    /// generation, and the DOM-interaction action family.
    pub fn standard(backend: Arc<dyn DurableBackend>, actions: Arc<dyn ActionDispatcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(KnowledgeSearchTool::new(Arc::clone(&backend))));
        registry.register(Box::new(ProductSearchTool::new(Arc::clone(&backend))));
        registry.register(Box::new(PageGeneratorTool::new(backend)));
        for action in DOM_ACTIONS {
            registry.register(Box::new(DomActionTool::new(*action, Arc::clone(&actions))));
        }
        registry
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All registered tool names, sorted (used in unknown-tool errors).
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use riptide_core::backend::TraceRecord;
    use riptide_core::error::BackendError;
    use riptide_core::message::{Message, SessionId};
    use serde_json::json;

    /// Backend stub whose tool endpoints echo their inputs.
    pub struct EchoBackend;

    #[async_trait]
    impl DurableBackend for EchoBackend {
        async fn save_message(
            &self,
            _session: &SessionId,
            _message: &Message,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn get_messages(&self, _session: &SessionId) -> Result<Vec<Message>, BackendError> {
            Ok(Vec::new())
        }

        async fn save_trace(&self, _trace: TraceRecord) -> Result<(), BackendError> {
            Ok(())
        }

        async fn search_knowledge(&self, query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(json!({"kind": "knowledge", "query": query}))
        }

        async fn search_products(&self, query: &str) -> Result<serde_json::Value, BackendError> {
            Ok(json!({"kind": "products", "query": query}))
        }

        async fn generate_page(
            &self,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, BackendError> {
            Ok(json!({"kind": "page", "params": params}))
        }
    }

    /// Action dispatcher stub that echoes the action name.
    pub struct EchoActions;

    #[async_trait]
    impl ActionDispatcher for EchoActions {
        async fn perform_action(
            &self,
            name: &str,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(json!({"action": name, "params": params}))
        }
    }
}
