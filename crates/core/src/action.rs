//! DOM/widget action collaborator.

use async_trait::async_trait;

use crate::error::ToolError;

/// Performs a named UI action on behalf of the agent.
///
/// Backs the built-in DOM-interaction tool family and the tenant
/// custom-tool fallback. The actual DOM manipulation lives with the
/// embedding application.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn perform_action(
        &self,
        name: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}
