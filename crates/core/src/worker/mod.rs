//! The offline cache worker.
//!
//! A [`Worker`] is one deployed version of the application shell. The host
//! drives it through a fixed set of events:
//!
//! - `install`: stage shell resources into the staging store
//! - `activate`: reconcile the content store against the manifest
//! - `fetch`: route a request to cache, network, or both
//! - `message`: control commands from the foreground application
//!
//! Lifecycle progress is published on a watch channel. Fetches wait for
//! activation to finish before touching the stores.

mod control;
mod fetch;
mod lifecycle;
mod state;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::Error;
use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::http::Request;
use crate::network::Network;

pub use control::{DOWNLOAD_OFFLINE, PrefetchReport, SKIP_WAITING};
pub use fetch::{FetchDecision, ServeSource, Served};
pub use lifecycle::{ActivationOutcome, MANIFEST_ENTRY};
pub use state::{WorkerSignal, WorkerState};

/// Capacity of the signal channel; slow subscribers see `Lagged`.
const SIGNAL_CAPACITY: usize = 16;

/// Lifecycle and control events a host can deliver.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(String),
}

/// Result of dispatching a [`WorkerEvent`].
#[derive(Debug)]
pub enum EventResult {
    Installed,
    Activated(ActivationOutcome),
    Fetch(FetchDecision),
    /// A message was handled; carries the prefetch task if one was started.
    Message(Option<JoinHandle<Result<PrefetchReport, Error>>>),
}

/// One worker version bound to its stores and network.
///
/// Cloning is cheap and every clone drives the same state machine.
#[derive(Clone)]
pub struct Worker {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: Arc<watch::Sender<WorkerState>>,
    signals: broadcast::Sender<WorkerSignal>,
}

impl Worker {
    pub fn new(config: Arc<WorkerConfig>, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        let (state, _) = watch::channel(WorkerState::Parsed);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { config, storage, network, state: Arc::new(state), signals }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Receive signals addressed to the host platform.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerSignal> {
        self.signals.subscribe()
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventResult, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(|()| EventResult::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventResult::Activated),
            WorkerEvent::Fetch(request) => Ok(EventResult::Fetch(self.handle_fetch(&request).await)),
            WorkerEvent::Message(data) => Ok(EventResult::Message(self.handle_message(&data))),
        }
    }

    fn signal(&self, signal: WorkerSignal) {
        tracing::debug!(?signal, "worker signal");
        // No subscribers is fine: the host may not care about this signal.
        let _ = self.signals.send(signal);
    }

    fn set_state(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        tracing::info!(from = %prev, to = %next, "worker state changed");
    }

    /// Move from `from` to `to`, or fail if the worker is elsewhere.
    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut actual = from;
        let moved = self.state.send_if_modified(|state| {
            actual = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });

        if !moved {
            return Err(Error::InvalidState(format!("expected {from}, worker is {actual}")));
        }
        tracing::info!(from = %from, to = %to, "worker state changed");
        Ok(())
    }
}
