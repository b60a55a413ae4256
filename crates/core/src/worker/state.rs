use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle states of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Created, no lifecycle event handled yet.
    Parsed,
    /// Staging shell resources.
    Installing,
    /// Shell resources staged, waiting for activation.
    Installed,
    /// Reconciling the content store.
    Activating,
    /// Reconciled and serving.
    Ready,
    /// Reconciliation failed and the stores were reset. Still serves, from
    /// an empty content store.
    Failed,
    /// Installation failed; this version never activates.
    Redundant,
}

impl WorkerState {
    /// States in which fetches are mediated.
    pub fn is_serving(self) -> bool {
        matches!(self, WorkerState::Ready | WorkerState::Failed)
    }

    /// States after which no further transition happens.
    pub fn is_settled(self) -> bool {
        matches!(self, WorkerState::Ready | WorkerState::Failed | WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Ready => "ready",
            WorkerState::Failed => "failed",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Requests from the worker to the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerSignal {
    /// Supersede the active version without waiting for its clients to close.
    SkipWaiting,
    /// Take control of every open client.
    ClaimClients,
}
