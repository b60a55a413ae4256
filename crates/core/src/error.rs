//! Unified error types for shellcache.
//!
//! Display strings carry a stable `CODE: detail` prefix so hosts can match
//! on the code without parsing the message.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type for the worker, its stores and its network seam.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A lifecycle operation was invoked from the wrong state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// A shell resource could not be staged.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Transport-level failure (no response was received).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A manifest could not be parsed or serialized.
    #[error("MANIFEST_INVALID: {0}")]
    ManifestInvalid(String),

    /// A stored body no longer matches its recorded digest.
    #[error("CORRUPT_ENTRY: {0}")]
    CorruptEntry(String),

    /// Generic store failure outside the database layer.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidState(msg) => (-32000, msg.clone()),
            Error::InstallFailed(msg) => (-32001, msg.clone()),
            Error::Network(msg) => (-32003, msg.clone()),
            Error::FetchTooLarge(msg) => (-32004, msg.clone()),
            Error::InvalidUrl(msg) => (-32005, msg.clone()),
            Error::ManifestInvalid(msg) => (-32006, msg.clone()),
            Error::CorruptEntry(msg) => (-32007, msg.clone()),
            Error::Cache(msg) => (-32002, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
