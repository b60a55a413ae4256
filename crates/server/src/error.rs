//! Structured errors for the shellcache server.
//!
//! Worker and store failures surface as `shellcache_core::Error`; these
//! cover what only the tool layer can get wrong.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Tool-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid tool parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A prefetch task ended without reporting.
    #[error("PREFETCH_ABORTED: {0}")]
    PrefetchAborted(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::PrefetchAborted(msg) => (-32008, msg.clone()),
            ToolError::Serialize(e) => (-32603, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_code() {
        let err: McpError = ToolError::InvalidInput("url cannot be empty".into()).into();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.message, "url cannot be empty");
    }

    #[test]
    fn test_display_carries_code() {
        let err = ToolError::PrefetchAborted("task panicked".into());
        assert_eq!(err.to_string(), "PREFETCH_ABORTED: task panicked");
    }
}
