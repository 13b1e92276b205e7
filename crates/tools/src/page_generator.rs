//! Page generation tool — delegates to the backend's generation endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use riptide_core::backend::DurableBackend;
use riptide_core::error::ToolError;
use riptide_core::tool::ToolResult;

use crate::BuiltinTool;

pub struct PageGeneratorTool {
    backend: Arc<dyn DurableBackend>,
}

impl PageGeneratorTool {
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BuiltinTool for PageGeneratorTool {
    fn name(&self) -> &str {
        "generate_page"
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        if !parameters.is_object() {
            return Err(ToolError::InvalidArguments(
                "generate_page expects an object of page parameters".into(),
            ));
        }

        let page = self
            .backend
            .generate_page(parameters)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "generate_page".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(page))
    }
}
