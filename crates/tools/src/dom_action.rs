//! DOM-interaction tool family.
//!
//! Each action name is registered as its own tool; all of them delegate to
//! the external [`ActionDispatcher`] collaborator, which owns the actual
//! DOM work.

use std::sync::Arc;

use async_trait::async_trait;
use riptide_core::action::ActionDispatcher;
use riptide_core::error::ToolError;
use riptide_core::tool::ToolResult;

use crate::BuiltinTool;

/// The built-in DOM action names.
pub const DOM_ACTIONS: &[&str] = &[
    "click_element",
    "fill_input",
    "scroll_to_section",
    "navigate_to",
    "highlight_element",
];

pub struct DomActionTool {
    action: String,
    dispatcher: Arc<dyn ActionDispatcher>,
}

impl DomActionTool {
    pub fn new(action: impl Into<String>, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            action: action.into(),
            dispatcher,
        }
    }
}

#[async_trait]
impl BuiltinTool for DomActionTool {
    fn name(&self) -> &str {
        &self.action
    }

    async fn execute(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        let outcome = self
            .dispatcher
            .perform_action(&self.action, parameters)
            .await?;
        Ok(ToolResult::ok(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EchoActions;
    use serde_json::json;

    #[tokio::test]
    async fn delegates_to_dispatcher() {
        let tool = DomActionTool::new("click_element", Arc::new(EchoActions));
        assert_eq!(tool.name(), "click_element");

        let result = tool.execute(json!({"selector": "#buy-now"})).await.unwrap();
        assert!(result.success);
        let value = result.result.unwrap();
        assert_eq!(value["action"], "click_element");
        assert_eq!(value["params"]["selector"], "#buy-now");
    }
}
