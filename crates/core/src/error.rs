//! Error types for the Riptide domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Riptide operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model stream errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Durable backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Memory store errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Re-entrant execution ---
    #[error("An execution is already in flight for this orchestrator")]
    Busy,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("Model request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Endpoint error: {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool disabled by tenant configuration: {0}")]
    Disabled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_displays_correctly() {
        let err = Error::Stream(StreamError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::Timeout {
            tool_name: "product_search".into(),
            timeout_ms: 20000,
        });
        assert!(err.to_string().contains("product_search"));
        assert!(err.to_string().contains("20000"));
    }
}
