//! Product catalog search tool — delegates to the backend's search endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use riptide_core::backend::DurableBackend;
use riptide_core::error::ToolError;
use riptide_core::tool::ToolResult;

use crate::BuiltinTool;

pub struct ProductSearchTool {
    backend: Arc<dyn DurableBackend>,
}

impl ProductSearchTool {
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BuiltinTool for ProductSearchTool {
    fn name(&self) -> &str {
        "product_search"
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = parameters["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let results = self
            .backend
            .search_products(query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "product_search".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(results))
    }
}
