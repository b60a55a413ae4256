//! SQLite-backed cache stores.
//!
//! Each named store is a row in `caches`; its entries cascade on delete.
//! Handles remember the row id they were opened against, so writes through
//! a handle whose store has since been deleted are dropped instead of
//! leaking into a recreated store of the same name.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::connection::CacheDb;
use super::hash::body_digest;
use super::{Cache, CacheStorage};
use crate::Error;
use crate::http::Response;

/// A single store inside a [`CacheDb`].
#[derive(Debug, Clone)]
pub struct SqliteCache {
    db: CacheDb,
    id: i64,
    name: String,
}

struct EntryRow {
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    body_sha256: String,
}

impl EntryRow {
    fn into_response(self) -> Result<Response, Error> {
        if body_digest(&self.body) != self.body_sha256 {
            return Err(Error::CorruptEntry(format!("body digest mismatch for {}", self.url)));
        }
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("invalid headers for {}: {e}", self.url)))?;

        Ok(Response { status: self.status, status_text: self.status_text, headers, body: Bytes::from(self.body) })
    }
}

#[async_trait]
impl Cache for SqliteCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, url: &str) -> Result<Option<Response>, Error> {
        let id = self.id;
        let url = url.to_string();
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, headers_json, body, body_sha256
                     FROM entries WHERE cache_id = ?1 AND url = ?2",
                )?;

                let result = stmt.query_row(params![id, url], |row| {
                    Ok(EntryRow {
                        url: row.get(0)?,
                        status: row.get(1)?,
                        status_text: row.get(2)?,
                        headers_json: row.get(3)?,
                        body: row.get(4)?,
                        body_sha256: row.get(5)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Insert or replace an entry.
    ///
    /// Replacing keeps the entry's original position in `keys()`.
    async fn put(&self, url: &str, response: &Response) -> Result<(), Error> {
        let id = self.id;
        let url = url.to_string();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::Cache(format!("failed to encode headers: {e}")))?;
        let digest = body_digest(&response.body);
        let response = response.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let written = conn.execute(
                    "INSERT INTO entries (
                        cache_id, url, status, status_text, headers_json, body, body_sha256, stored_at
                    )
                    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                    WHERE EXISTS (SELECT 1 FROM caches WHERE id = ?1)
                    ON CONFLICT(cache_id, url) DO UPDATE SET
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        body_sha256 = excluded.body_sha256,
                        stored_at = excluded.stored_at",
                    params![
                        id,
                        url,
                        response.status,
                        response.status_text,
                        headers_json,
                        response.body.as_ref(),
                        digest,
                        stored_at,
                    ],
                )?;
                if written == 0 {
                    tracing::debug!(cache_id = id, url = %url, "dropped write to deleted cache");
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, url: &str) -> Result<bool, Error> {
        let id = self.id;
        let url = url.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE cache_id = ?1 AND url = ?2", params![id, url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let id = self.id;
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE cache_id = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![id], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO caches (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![owned, created_at],
                )?;
                let id = conn.query_row("SELECT id FROM caches WHERE name = ?1", params![owned], |row| row.get(0))?;
                Ok(id)
            })
            .await
            .map_err(Error::from)?;

        let cache: Arc<dyn Cache> = Arc::new(SqliteCache { db: self.clone(), id, name: name.to_string() });
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn
                    .query_row("SELECT 1 FROM caches WHERE name = ?1", params![name], |row| row.get::<_, i64>(0))
                    .optional()?;
                Ok(exists.is_some())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}
