//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shellcache worker server.
//! Each tool drives one worker event or inspects the stores.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod message;

pub use cache::{CacheGetParams, get_impl, status_impl};
pub use fetch::{WorkerFetchParams, fetch_impl};
pub use lifecycle::{activate_impl, install_impl};
pub use message::{WorkerMessageParams, message_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Encode tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
