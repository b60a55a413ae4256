//! worker_message tool implementation.
//!
//! Posts a control message from the foreground application to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::Worker;
use shellcache_core::worker::{DOWNLOAD_OFFLINE, PrefetchReport, SKIP_WAITING};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message payload: "skipWaiting" or "downloadOffline". Anything else is ignored.
    pub data: String,

    /// Wait for a started prefetch to finish and report it (default: false).
    #[serde(default)]
    pub wait: bool,
}

/// Output structure for the worker_message tool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerMessageOutput {
    /// "skip_waiting", "download_offline" or "ignored".
    pub action: &'static str,
    /// Prefetch result, present only when waited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PrefetchReport>,
}

/// Implementation of the worker_message tool.
pub async fn message_impl(worker: &Worker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let action = match params.data.as_str() {
        SKIP_WAITING => "skip_waiting",
        DOWNLOAD_OFFLINE => "download_offline",
        _ => "ignored",
    };

    let report = match worker.handle_message(&params.data) {
        Some(task) if params.wait => {
            let report = task.await.map_err(|e| ToolError::PrefetchAborted(e.to_string()))??;
            Some(report)
        }
        Some(task) => {
            tokio::spawn(async move {
                match task.await {
                    Ok(Ok(report)) => tracing::info!(?report, "offline download complete"),
                    Ok(Err(err)) => tracing::warn!(error = %err, "offline download failed"),
                    Err(err) => tracing::error!(error = %err, "offline download aborted"),
                }
            });
            None
        }
        None => None,
    };

    json_result(&WorkerMessageOutput { action, report })
}
