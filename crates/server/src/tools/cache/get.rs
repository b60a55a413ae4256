//! cache_get tool implementation.
//!
//! Reads an entry from the content store without going through the
//! worker's routing.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::resolve;
use shellcache_core::{Error, Worker};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Cached request URL, absolute or relative to the worker origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    pub url: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &Worker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&worker.config().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let names = &worker.config().names;

    let entry = if worker.storage().has(&names.content).await? {
        worker.storage().open(&names.content).await?.get(&url).await?
    } else {
        None
    };

    let output = match entry {
        Some(response) => CacheGetOutput {
            url,
            found: true,
            status: Some(response.status),
            headers: response.headers,
            body_bytes: Some(response.body.len()),
        },
        None => CacheGetOutput { url, found: false, status: None, headers: Vec::new(), body_bytes: None },
    };

    json_result(&output)
}
