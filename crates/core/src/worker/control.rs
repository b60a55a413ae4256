//! Commands posted by the foreground application.

use std::collections::HashSet;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::{Worker, WorkerSignal};
use crate::Error;
use crate::http::Request;
use crate::keys::{request_url, resource_key};

/// Ask the worker to supersede the active version immediately.
pub const SKIP_WAITING: &str = "skipWaiting";

/// Ask the worker to make every manifest resource available offline.
pub const DOWNLOAD_OFFLINE: &str = "downloadOffline";

/// Outcome of a prefetch-all run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Manifest resources that were missing from the content store.
    pub requested: usize,
    pub stored: usize,
}

impl Worker {
    /// Handle a control message.
    ///
    /// Returns the prefetch task when one was started. Unknown messages are
    /// ignored.
    pub fn handle_message(&self, data: &str) -> Option<JoinHandle<Result<PrefetchReport, Error>>> {
        match data {
            SKIP_WAITING => {
                self.signal(WorkerSignal::SkipWaiting);
                None
            }
            DOWNLOAD_OFFLINE => {
                let worker = self.clone();
                Some(tokio::spawn(async move { worker.download_offline().await }))
            }
            other => {
                tracing::debug!(message = %other, "ignoring unknown message");
                None
            }
        }
    }

    /// Fetch every manifest resource the content store does not hold yet.
    ///
    /// All-or-nothing: if any fetch fails or returns a non-ok status nothing
    /// is stored.
    pub async fn download_offline(&self) -> Result<PrefetchReport, Error> {
        let content = self.storage.open(&self.config.names.content).await?;

        let present: HashSet<String> = content
            .keys()
            .await?
            .iter()
            .filter_map(|url| resource_key(url, &self.config.origin))
            .collect();

        let requests: Vec<Request> = self
            .config
            .manifest
            .keys()
            .filter(|key| !present.contains(*key))
            .map(|key| Request::get(request_url(&self.config.origin, key)))
            .collect();

        tracing::info!(missing = requests.len(), "prefetching manifest resources");
        let stored = self.add_all(content.as_ref(), &requests).await?;

        Ok(PrefetchReport { requested: requests.len(), stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;
    use crate::worker::WorkerState;
    use crate::worker::testing::*;

    const MANIFEST: &[(&str, &str)] = &[("/", "h1"), ("index.html", "h1"), ("a.js", "f1"), ("b.js", "f2")];

    async fn ready(harness: &Harness) -> Worker {
        harness.network.serve(&asset_url("index.html"), "index");
        let (worker, _) = harness.deploy(config(MANIFEST, &["index.html"])).await;
        harness.network.clear_requests();
        worker
    }

    fn serve_rest(harness: &Harness) {
        harness.network.serve(&asset_url("/"), "root");
        harness.network.serve(&asset_url("a.js"), "a");
        harness.network.serve(&asset_url("b.js"), "b");
    }

    #[tokio::test]
    async fn test_skip_waiting_signals_host() {
        let harness = Harness::new();
        let worker = harness.worker(config(MANIFEST, &[]));
        let mut signals = worker.subscribe();

        assert!(worker.handle_message(SKIP_WAITING).is_none());
        assert_eq!(signals.recv().await.unwrap(), WorkerSignal::SkipWaiting);
        assert_eq!(worker.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let harness = Harness::new();
        let worker = harness.worker(config(MANIFEST, &[]));
        let mut signals = worker.subscribe();

        assert!(worker.handle_message("reload").is_none());
        assert!(worker.handle_message("").is_none());
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_download_offline_fetches_only_missing() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        serve_rest(&harness);

        let report = worker.handle_message(DOWNLOAD_OFFLINE).unwrap().await.unwrap().unwrap();

        assert_eq!(report, PrefetchReport { requested: 3, stored: 3 });
        assert_eq!(harness.network.request_count(&asset_url("index.html")), 0);
        let names = worker.config().names.clone();
        assert_eq!(harness.content_keys(&names).await.len(), 4);
        assert_eq!(harness.content_body(&names, "/").await.as_deref(), Some("root"));
    }

    #[tokio::test]
    async fn test_download_offline_recognizes_versioned_urls() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        serve_rest(&harness);
        let versioned = format!("{}?v=3", asset_url("a.js"));
        harness.network.serve(&versioned, "a");
        worker.handle_fetch(&Request::get(versioned.as_str())).await;
        harness.network.clear_requests();

        let report = worker.download_offline().await.unwrap();

        assert_eq!(report, PrefetchReport { requested: 2, stored: 2 });
        assert_eq!(harness.network.request_count(&asset_url("a.js")), 0);
    }

    #[tokio::test]
    async fn test_download_offline_all_or_nothing() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        harness.network.serve(&asset_url("/"), "root");
        harness.network.serve(&asset_url("a.js"), "a");

        let err = worker.download_offline().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));

        let names = worker.config().names.clone();
        assert_eq!(harness.content_keys(&names).await, vec![asset_url("index.html")]);
    }

    #[tokio::test]
    async fn test_download_offline_when_complete_is_noop() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        serve_rest(&harness);
        worker.download_offline().await.unwrap();
        harness.network.clear_requests();

        let report = worker.download_offline().await.unwrap();
        assert_eq!(report, PrefetchReport { requested: 0, stored: 0 });
        assert!(harness.network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prefetched_entries_are_served_from_cache() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        serve_rest(&harness);
        worker.download_offline().await.unwrap();
        harness.network.set_offline(true);

        let content = harness.storage.open(&worker.config().names.content).await.unwrap();
        assert!(content.get(&asset_url("b.js")).await.unwrap().is_some());
        let decision = worker.handle_fetch(&Request::get(asset_url("b.js"))).await;
        assert!(matches!(decision, crate::worker::FetchDecision::Respond(Ok(_))));
    }
}
