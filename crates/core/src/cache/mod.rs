//! Named key-value cache stores.
//!
//! The worker only ever sees the [`CacheStorage`] and [`Cache`] traits.
//! Two backends implement them:
//!
//! - [`MemoryStorage`]: in-process maps, for tests and ephemeral hosts
//! - [`CacheDb`]: SQLite via tokio-rusqlite, with versioned schema
//!   upgrades and per-entry body digests

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use crate::Error;
use crate::http::Response;

pub use connection::CacheDb;
pub use memory::MemoryStorage;

/// A single named store mapping request URLs to responses.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name this handle was opened with.
    fn name(&self) -> &str;

    async fn get(&self, url: &str) -> Result<Option<Response>, Error>;

    /// Insert or replace the entry for `url`.
    async fn put(&self, url: &str, response: &Response) -> Result<(), Error>;

    /// Returns true if an entry was removed.
    async fn delete(&self, url: &str) -> Result<bool, Error>;

    /// All stored URLs in insertion order.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

/// The set of named stores available to a worker.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the store called `name`, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error>;

    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Delete the store and every entry in it. Returns true if it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn names(&self) -> Result<Vec<String>, Error>;
}

/// Names of the three stores a worker uses, scoped per application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    /// Persistent content store.
    pub content: String,
    /// Staging store filled during install.
    pub temp: String,
    /// Metadata store holding the last applied manifest.
    pub manifest: String,
}

impl CacheNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            content: format!("{prefix}-app-cache"),
            temp: format!("{prefix}-temp-cache"),
            manifest: format!("{prefix}-app-manifest"),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.content, &self.temp, &self.manifest]
    }
}

/// Copy every entry of `from` into `to`, overwriting existing keys.
///
/// Returns the number of entries copied.
pub async fn copy_entries(from: &dyn Cache, to: &dyn Cache) -> Result<usize, Error> {
    let mut copied = 0;
    for url in from.keys().await? {
        if let Some(response) = from.get(&url).await? {
            to.put(&url, &response).await?;
            copied += 1;
        }
    }
    Ok(copied)
}
