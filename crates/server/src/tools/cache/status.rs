//! cache_status tool implementation.
//!
//! Reports the worker state and the key count of each store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use shellcache_core::Worker;
use shellcache_core::worker::WorkerState;

use crate::tools::json_result;

/// Key count of one store. Missing stores are reported, not created.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub name: String,
    pub exists: bool,
    pub keys: usize,
}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusOutput {
    pub state: WorkerState,
    pub origin: String,
    /// Number of resources the manifest declares.
    pub manifest_size: usize,
    pub stores: Vec<StoreStatus>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let storage = worker.storage();
    let mut stores = Vec::new();

    for name in worker.config().names.all() {
        let exists = storage.has(name).await?;
        let keys = if exists { storage.open(name).await?.keys().await?.len() } else { 0 };
        stores.push(StoreStatus { name: name.to_string(), exists, keys });
    }

    let output = CacheStatusOutput {
        state: worker.state(),
        origin: worker.config().origin.clone(),
        manifest_size: worker.config().manifest.len(),
        stores,
    };

    json_result(&output)
}
