//! worker_install and worker_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use shellcache_core::Worker;
use shellcache_core::worker::{ActivationOutcome, WorkerState};

use super::json_result;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutput {
    pub state: WorkerState,
    /// Number of shell resources staged.
    pub staged: usize,
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub outcome: ActivationOutcome,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    worker.install().await?;
    json_result(&InstallOutput { state: worker.state(), staged: worker.config().shell.len() })
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let outcome = worker.activate().await?;
    json_result(&ActivateOutput { state: worker.state(), outcome })
}
