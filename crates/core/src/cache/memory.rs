//! In-process cache storage.
//!
//! Stores live in a map behind a tokio `RwLock`. A handle keeps its own
//! reference to the store it opened, so once the store is deleted from the
//! storage the handle is detached: it still works but nothing written
//! through it is visible to later `open` calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Cache, CacheStorage};
use crate::Error;
use crate::http::Response;

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    responses: HashMap<String, Response>,
}

/// A single in-memory store.
pub struct MemoryCache {
    name: String,
    entries: RwLock<Entries>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: RwLock::new(Entries::default()) }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, url: &str) -> Result<Option<Response>, Error> {
        Ok(self.entries.read().await.responses.get(url).cloned())
    }

    async fn put(&self, url: &str, response: &Response) -> Result<(), Error> {
        let mut entries = self.entries.write().await;
        if entries.responses.insert(url.to_string(), response.clone()).is_none() {
            entries.order.push(url.to_string());
        }
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool, Error> {
        let mut entries = self.entries.write().await;
        if entries.responses.remove(url).is_none() {
            return Ok(false);
        }
        entries.order.retain(|u| u != url);
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.read().await.order.clone())
    }
}

/// In-memory [`CacheStorage`].
#[derive(Default, Clone)]
pub struct MemoryStorage {
    caches: Arc<RwLock<HashMap<String, Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error> {
        {
            let caches = self.caches.read().await;
            if let Some(cache) = caches.get(name) {
                let cache: Arc<dyn Cache> = cache.clone();
                return Ok(cache);
            }
        }

        let mut caches = self.caches.write().await;
        let cache: Arc<dyn Cache> = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
