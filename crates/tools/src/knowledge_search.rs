//! Knowledge-base search tool — delegates to the backend's search endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use riptide_core::backend::DurableBackend;
use riptide_core::error::ToolError;
use riptide_core::tool::ToolResult;

use crate::BuiltinTool;

pub struct KnowledgeSearchTool {
    backend: Arc<dyn DurableBackend>,
}

impl KnowledgeSearchTool {
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl BuiltinTool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "knowledge_search"
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = parameters["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let results = self
            .backend
            .search_knowledge(query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "knowledge_search".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EchoBackend;
    use serde_json::json;

    #[tokio::test]
    async fn searches_via_backend() {
        let tool = KnowledgeSearchTool::new(Arc::new(EchoBackend));
        let result = tool.execute(json!({"query": "returns policy"})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.result.unwrap()["query"], "returns policy");
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = KnowledgeSearchTool::new(Arc::new(EchoBackend));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
