//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not a bare http(s) origin
    /// - `max_bytes` is 0 or exceeds 1GB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `cache_prefix` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_origin(&self.origin)?;

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 1024 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 1GB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        if self.shell_resources.is_empty() {
            tracing::warn!("shell_resources is empty; install will stage nothing");
        }

        Ok(())
    }
}

/// Parse and serialize an origin as `scheme://host[:port]`.
pub(crate) fn parse_origin(input: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid { field: "origin".into(), reason: reason.into() };

    let parsed = url::Url::parse(input.trim()).map_err(|e| invalid(&e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(invalid("scheme must be http or https")),
    }
    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("must not contain a path, query or fragment"));
    }

    Ok(parsed.origin().ascii_serialization())
}
