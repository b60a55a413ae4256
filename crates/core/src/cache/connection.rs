//! Database connection management with pragma configuration.
//!
//! Opens the SQLite database, applies the pragmas the store relies on (WAL
//! mode, foreign keys for cascading store deletion) and brings the schema up
//! to date. The schema version lives in SQLite's `user_version` header field.

use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;
                       PRAGMA foreign_keys=ON;";

/// Schema upgrades. Entry `i` moves the database from version `i` to `i + 1`.
const SCHEMA: &[&str] = &[include_str!("../../migrations/001_caches.sql")];

/// Persistent cache storage handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas,
    /// and upgrades the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        upgrade_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Schema version recorded in the database file.
    pub async fn schema_version(&self) -> Result<usize, Error> {
        let version: i64 = self
            .conn
            .call(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
            .await?;
        Ok(version as usize)
    }
}

/// Apply every schema step past the recorded version in one transaction.
///
/// A file written by a newer build is refused rather than downgraded.
async fn upgrade_schema(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let tx = conn.transaction()?;
        let recorded: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        let recorded = recorded as usize;

        if recorded > SCHEMA.len() {
            return Err(Error::MigrationFailed(format!(
                "database schema version {} is newer than supported version {}",
                recorded,
                SCHEMA.len()
            )));
        }

        for (step, sql) in SCHEMA.iter().enumerate().skip(recorded) {
            tracing::debug!(version = step + 1, "upgrading cache schema");
            tx.execute_batch(sql)?;
        }
        if recorded < SCHEMA.len() {
            tx.pragma_update(None, "user_version", SCHEMA.len() as i64)?;
        }

        tx.commit()?;
        Ok(())
    })
    .await
    .map_err(Error::from)
}
