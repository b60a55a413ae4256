//! Install and activate transitions.
//!
//! Install stages the shell into the staging store. Activate reconciles the
//! content store against the manifest: entries are trusted only if the
//! fingerprint they were cached under (recorded in the previous manifest)
//! still matches the current one. Any failure during activation resets all
//! three stores so the next activation starts from scratch.

use serde::Serialize;

use super::{Worker, WorkerSignal, WorkerState};
use crate::Error;
use crate::cache::{Cache, copy_entries};
use crate::http::{CacheMode, Request, Response};
use crate::keys::{request_url, resource_key};
use crate::manifest::ResourceManifest;

/// Key of the single metadata store entry holding the applied manifest.
pub const MANIFEST_ENTRY: &str = "manifest";

/// What an activation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// No prior manifest: the content store was rebuilt from staging.
    FirstRun { promoted: usize },
    /// Prior manifest found: unchanged entries kept, stale ones evicted.
    Upgraded { retained: usize, evicted: usize, promoted: usize },
    /// Reconciliation failed and every store was deleted.
    Reset { reason: String },
}

impl Worker {
    /// Stage the shell resources.
    ///
    /// Every shell resource is fetched bypassing intermediate caches. If any
    /// of them fails nothing is staged, the worker becomes `Redundant` and
    /// the previously active version keeps serving.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        self.signal(WorkerSignal::SkipWaiting);

        match self.stage_shell().await {
            Ok(staged) => {
                tracing::info!(staged, "shell resources staged");
                self.set_state(WorkerState::Installed);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(Error::InstallFailed(err.to_string()))
            }
        }
    }

    async fn stage_shell(&self) -> Result<usize, Error> {
        let names = &self.config.names;

        // Leftovers from a version that installed but never activated.
        self.storage.delete(&names.temp).await?;
        let temp = self.storage.open(&names.temp).await?;

        let requests: Vec<Request> = self
            .config
            .shell
            .iter()
            .map(|key| Request::get(request_url(&self.config.origin, key)).with_cache_mode(CacheMode::Reload))
            .collect();

        self.add_all(temp.as_ref(), &requests).await
    }

    /// Reconcile the content store and start serving.
    ///
    /// Only the state precondition is reported as `Err`; a failed
    /// reconciliation is the [`ActivationOutcome::Reset`] outcome and leaves
    /// the worker `Failed` but still serving from an empty cache.
    pub async fn activate(&self) -> Result<ActivationOutcome, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;

        let outcome = match self.reconcile().await {
            Ok(outcome) => {
                tracing::info!(?outcome, "activation complete");
                self.set_state(WorkerState::Ready);
                outcome
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to upgrade worker; resetting caches");
                self.reset().await;
                self.set_state(WorkerState::Failed);
                ActivationOutcome::Reset { reason: err.to_string() }
            }
        };

        Ok(outcome)
    }

    async fn reconcile(&self) -> Result<ActivationOutcome, Error> {
        let names = &self.config.names;
        let mut content = self.storage.open(&names.content).await?;
        let temp = self.storage.open(&names.temp).await?;
        let metadata = self.storage.open(&names.manifest).await?;

        let prior = match metadata.get(MANIFEST_ENTRY).await? {
            Some(entry) => Some(ResourceManifest::from_json(&entry.body)?),
            None => None,
        };

        let kept = match &prior {
            None => {
                tracing::info!("no prior manifest; rebuilding content cache");
                self.storage.delete(&names.content).await?;
                content = self.storage.open(&names.content).await?;
                None
            }
            Some(prior) => Some(self.evict_stale(content.as_ref(), prior).await?),
        };

        let promoted = copy_entries(temp.as_ref(), content.as_ref()).await?;
        self.storage.delete(&names.temp).await?;

        let manifest = Response::new(200, self.config.manifest.to_json()?).with_header("content-type", "application/json");
        metadata.put(MANIFEST_ENTRY, &manifest).await?;

        self.signal(WorkerSignal::ClaimClients);

        Ok(match kept {
            None => ActivationOutcome::FirstRun { promoted },
            Some((retained, evicted)) => ActivationOutcome::Upgraded { retained, evicted, promoted },
        })
    }

    /// Delete every content entry whose fingerprint changed since it was
    /// cached or that the current manifest no longer declares.
    ///
    /// Returns `(retained, evicted)`.
    async fn evict_stale(&self, content: &dyn Cache, prior: &ResourceManifest) -> Result<(usize, usize), Error> {
        let current = &self.config.manifest;
        let mut retained = 0;
        let mut evicted = 0;

        for url in content.keys().await? {
            let trusted = resource_key(&url, &self.config.origin).is_some_and(|key| {
                current
                    .fingerprint(&key)
                    .is_some_and(|fingerprint| prior.fingerprint(&key) == Some(fingerprint))
            });

            if trusted {
                retained += 1;
            } else {
                tracing::debug!(url = %url, "evicting stale entry");
                content.delete(&url).await?;
                evicted += 1;
            }
        }

        Ok((retained, evicted))
    }

    /// Delete the content, staging and metadata stores.
    async fn reset(&self) {
        for name in self.config.names.all() {
            if let Err(err) = self.storage.delete(name).await {
                tracing::warn!(cache = name, error = %err, "failed to delete cache during reset");
            }
        }
    }

    /// Fetch every request and store all responses, or none of them.
    ///
    /// Fails on the first transport error or non-ok status before anything
    /// is written.
    pub(super) async fn add_all(&self, cache: &dyn Cache, requests: &[Request]) -> Result<usize, Error> {
        let mut fetched = Vec::with_capacity(requests.len());
        for request in requests {
            let response = self.network.fetch(request).await?;
            if !response.is_ok() {
                return Err(Error::Network(format!("{} returned status {}", request.url, response.status)));
            }
            fetched.push((request, response));
        }

        for (request, response) in &fetched {
            cache.put(&request.url, response).await?;
        }

        Ok(fetched.len())
    }
}
