//! Per-request routing between cache and network.
//!
//! Only `GET` requests for manifest-declared resources are mediated. The
//! root document is online-first so it reflects the latest deployment
//! whenever the network is reachable; everything else is cache-first and
//! trusts activation to have evicted stale entries.

use std::sync::Arc;

use serde::Serialize;

use super::{Worker, WorkerState};
use crate::Error;
use crate::cache::Cache;
use crate::http::{Request, Response};
use crate::keys::{ROOT_KEY, cache_url, resource_key};

/// Where a mediated response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeSource {
    Cache,
    Network,
}

/// A response the worker answered with.
#[derive(Debug, Clone)]
pub struct Served {
    /// Manifest key the request resolved to.
    pub key: String,
    pub response: Response,
    pub source: ServeSource,
}

/// Whether the worker answers a request or leaves it to the platform.
#[derive(Debug)]
pub enum FetchDecision {
    /// Not governed by this worker; the platform fetches natively.
    Passthrough,
    /// Answered by the worker, successfully or with the propagated failure.
    Respond(Result<Served, Error>),
}

impl FetchDecision {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchDecision::Passthrough)
    }
}

impl Worker {
    /// Handle an intercepted request.
    ///
    /// Suspends until activation has finished if it is still in progress.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDecision {
        if !request.is_get() {
            return FetchDecision::Passthrough;
        }

        let Some(key) = resource_key(&request.url, &self.config.origin) else {
            return FetchDecision::Passthrough;
        };
        if !self.config.manifest.contains(&key) {
            tracing::debug!(url = %request.url, key = %key, "not in manifest; passing through");
            return FetchDecision::Passthrough;
        }

        if !self.wait_until_serving().await {
            return FetchDecision::Passthrough;
        }

        let result = if key == ROOT_KEY { self.online_first(request).await } else { self.cache_first(request).await };

        match &result {
            Ok((_, source)) => tracing::debug!(url = %request.url, ?source, "served"),
            Err(err) => tracing::debug!(url = %request.url, error = %err, "fetch failed"),
        }

        FetchDecision::Respond(result.map(|(response, source)| Served { key, response, source }))
    }

    /// Wait for an activation in progress to settle. False if this version
    /// has not started its lifecycle or never activates.
    async fn wait_until_serving(&self) -> bool {
        let mut state = self.state.subscribe();
        if *state.borrow_and_update() == WorkerState::Parsed {
            return false;
        }
        match state.wait_for(|s| s.is_settled()).await {
            Ok(settled) => settled.is_serving(),
            Err(_) => false,
        }
    }

    async fn content(&self) -> Result<Arc<dyn Cache>, Error> {
        self.storage.open(&self.config.names.content).await
    }

    /// Network first; a copy of whatever the network returns is cached.
    /// Falls back to the cache only when the network fails outright.
    async fn online_first(&self, request: &Request) -> Result<(Response, ServeSource), Error> {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(request, &response).await;
                Ok((response, ServeSource::Network))
            }
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "network failed; falling back to cache");
                match self.lookup(request).await {
                    Ok(Some(cached)) => Ok((cached, ServeSource::Cache)),
                    Ok(None) => Err(err),
                    Err(lookup_err) => {
                        tracing::warn!(url = %request.url, error = %lookup_err, "cache fallback failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Cache first; on a miss, fetch and cache the response if it is ok.
    async fn cache_first(&self, request: &Request) -> Result<(Response, ServeSource), Error> {
        if let Some(cached) = self.lookup(request).await? {
            return Ok((cached, ServeSource::Cache));
        }

        let response = self.network.fetch(request).await?;
        if response.is_ok() {
            self.store(request, &response).await;
        }
        Ok((response, ServeSource::Network))
    }

    /// Content store lookup. A corrupt entry is dropped and treated as a miss.
    async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        let content = self.content().await?;
        let url = cache_url(&request.url, &self.config.origin);
        match content.get(&url).await {
            Ok(found) => Ok(found),
            Err(Error::CorruptEntry(detail)) => {
                tracing::warn!(url = %url, detail = %detail, "dropping corrupt cache entry");
                content.delete(&url).await?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Write-behind: a failed cache write never fails the response.
    async fn store(&self, request: &Request, response: &Response) {
        let written = match self.content().await {
            Ok(content) => content.put(&cache_url(&request.url, &self.config.origin), response).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::warn!(url = %request.url, error = %err, "failed to cache response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;
    use crate::worker::testing::*;
    use crate::worker::ActivationOutcome;

    const MANIFEST: &[(&str, &str)] = &[("/", "h1"), ("index.html", "h1"), ("a.js", "f1"), ("img/logo.png", "p1")];

    async fn ready(harness: &Harness) -> Worker {
        harness.network.serve(&asset_url("index.html"), "index");
        let (worker, _) = harness.deploy(config(MANIFEST, &["index.html"])).await;
        harness.network.clear_requests();
        worker
    }

    fn served(decision: FetchDecision) -> Served {
        match decision {
            FetchDecision::Respond(Ok(served)) => served,
            other => panic!("expected a served response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_root_variants_are_online_first() {
        let harness = Harness::new();
        let worker = ready(&harness).await;

        for url in [
            ORIGIN.to_string(),
            format!("{ORIGIN}/"),
            format!("{ORIGIN}/#/memorial/3"),
            format!("{ORIGIN}/?v=123"),
        ] {
            harness.network.serve(&url, "root");
            let served = served(worker.handle_fetch(&Request::get(url.as_str())).await);
            assert_eq!(served.key, ROOT_KEY);
            assert_eq!(served.source, ServeSource::Network);
            assert_eq!(harness.network.request_count(&url), 1);
        }
    }

    #[tokio::test]
    async fn test_online_first_refreshes_cached_copy() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        let root = asset_url("/");

        harness.network.serve(&root, "root@1");
        worker.handle_fetch(&Request::get(root.as_str())).await;
        harness.network.serve(&root, "root@2");
        let served = served(worker.handle_fetch(&Request::get(root.as_str())).await);

        assert_eq!(served.source, ServeSource::Network);
        assert_eq!(served.response.body.as_ref(), b"root@2");
        let names = worker.config().names.clone();
        assert_eq!(harness.content_body(&names, "/").await.as_deref(), Some("root@2"));
    }

    #[tokio::test]
    async fn test_online_first_falls_back_when_offline() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        let root = asset_url("/");

        harness.network.serve(&root, "root");
        worker.handle_fetch(&Request::get(root.as_str())).await;

        harness.network.set_offline(true);
        let served = served(worker.handle_fetch(&Request::get(root.as_str())).await);
        assert_eq!(served.source, ServeSource::Cache);
        assert_eq!(served.response.body.as_ref(), b"root");
    }

    #[tokio::test]
    async fn test_online_first_offline_without_copy_propagates() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        harness.network.set_offline(true);

        let decision = worker.handle_fetch(&Request::get(asset_url("/"))).await;
        assert!(matches!(decision, FetchDecision::Respond(Err(Error::Network(_)))));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let harness = Harness::new();
        let worker = ready(&harness).await;

        let served = served(worker.handle_fetch(&Request::get(asset_url("index.html"))).await);

        assert_eq!(served.source, ServeSource::Cache);
        assert_eq!(served.response.body.as_ref(), b"index");
        assert!(harness.network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cache_miss_populates_lazily() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        harness.network.serve(&asset_url("a.js"), "a");

        let first = served(worker.handle_fetch(&Request::get(asset_url("a.js"))).await);
        let second = served(worker.handle_fetch(&Request::get(asset_url("a.js"))).await);

        assert_eq!(first.source, ServeSource::Network);
        assert_eq!(second.source, ServeSource::Cache);
        assert_eq!(harness.network.request_count(&asset_url("a.js")), 1);
    }

    #[tokio::test]
    async fn test_error_status_returned_uncached() {
        let harness = Harness::new();
        let worker = ready(&harness).await;

        let served = served(worker.handle_fetch(&Request::get(asset_url("img/logo.png"))).await);
        assert_eq!(served.response.status, 404);

        let names = worker.config().names.clone();
        assert_eq!(harness.content_body(&names, "img/logo.png").await, None);
    }

    #[tokio::test]
    async fn test_cache_miss_offline_propagates() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        harness.network.set_offline(true);

        let decision = worker.handle_fetch(&Request::get(asset_url("a.js"))).await;
        assert!(matches!(decision, FetchDecision::Respond(Err(Error::Network(_)))));
    }

    #[tokio::test]
    async fn test_version_query_resolves_but_caches_by_url() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        let url = format!("{}?v=7", asset_url("a.js"));
        harness.network.serve(&url, "a");

        let served = served(worker.handle_fetch(&Request::get(url.as_str())).await);
        assert_eq!(served.key, "a.js");

        let content = harness.storage.open(&worker.config().names.content).await.unwrap();
        assert!(content.get(&url).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_resource_passes_through() {
        let harness = Harness::new();
        let worker = ready(&harness).await;

        let decision = worker.handle_fetch(&Request::get(asset_url("not-in-manifest.js"))).await;
        assert!(decision.is_passthrough());
        assert!(harness.network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_non_get_and_foreign_origin_pass_through() {
        let harness = Harness::new();
        let worker = ready(&harness).await;

        assert!(worker.handle_fetch(&Request::new("POST", asset_url("a.js"))).await.is_passthrough());
        assert!(worker.handle_fetch(&Request::get("https://cdn.example/a.js")).await.is_passthrough());
        assert!(harness.network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_waits_for_activation() {
        let harness = Harness::new();
        harness.network.serve(&asset_url("index.html"), "index");
        let worker = harness.worker(config(MANIFEST, &["index.html"]));
        worker.install().await.unwrap();

        let pending = tokio::spawn({
            let worker = worker.clone();
            async move { worker.handle_fetch(&Request::get(asset_url("index.html"))).await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        let outcome = worker.activate().await.unwrap();
        assert_eq!(outcome, ActivationOutcome::FirstRun { promoted: 1 });

        let served = served(pending.await.unwrap());
        assert_eq!(served.source, ServeSource::Cache);
        assert_eq!(harness.network.request_count(&asset_url("index.html")), 1);
    }

    #[tokio::test]
    async fn test_redundant_worker_passes_through() {
        let harness = Harness::new();
        let worker = harness.worker(config(MANIFEST, &["index.html"]));
        assert!(worker.install().await.is_err());
        assert_eq!(worker.state(), WorkerState::Redundant);

        assert!(worker.handle_fetch(&Request::get(asset_url("a.js"))).await.is_passthrough());
    }

    #[tokio::test]
    async fn test_corrupt_entry_treated_as_miss() {
        let db = crate::cache::CacheDb::open_in_memory().await.unwrap();
        let network = std::sync::Arc::new(crate::network::testing::FakeNetwork::new());
        network.serve(&asset_url("index.html"), "index");
        network.serve(&asset_url("a.js"), "a");
        let worker = Worker::new(config(MANIFEST, &["index.html"]), std::sync::Arc::new(db.clone()), network.clone());
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker.handle_fetch(&Request::get(asset_url("a.js"))).await;

        db.conn
            .call(|conn| conn.execute("UPDATE entries SET body_sha256 = 'bad'", []))
            .await
            .unwrap();

        let served = served(worker.handle_fetch(&Request::get(asset_url("a.js"))).await);
        assert_eq!(served.source, ServeSource::Network);
        assert_eq!(served.response.body.as_ref(), b"a");
    }

    #[tokio::test]
    async fn test_root_copy_shared_across_hash_routes() {
        let harness = Harness::new();
        let worker = ready(&harness).await;
        let settings = format!("{ORIGIN}/#/settings");
        harness.network.serve(&settings, "root");
        served(worker.handle_fetch(&Request::get(settings.as_str())).await);

        let names = worker.config().names.clone();
        assert_eq!(harness.content_keys(&names).await, vec![asset_url("/"), asset_url("index.html")]);

        harness.network.set_offline(true);
        for url in [ORIGIN.to_string(), format!("{ORIGIN}/"), format!("{ORIGIN}/#/other")] {
            let served = served(worker.handle_fetch(&Request::get(url.as_str())).await);
            assert_eq!(served.source, ServeSource::Cache);
            assert_eq!(served.response.body.as_ref(), b"root");
        }
    }

    #[tokio::test]
    async fn test_fetch_before_install_passes_through() {
        let harness = Harness::new();
        harness.network.serve(&asset_url("a.js"), "a");
        let worker = harness.worker(config(MANIFEST, &["index.html"]));

        let decision = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            worker.handle_fetch(&Request::get(asset_url("a.js"))),
        )
        .await
        .unwrap();
        assert!(decision.is_passthrough());
        assert!(harness.network.requests().is_empty());
    }
}
