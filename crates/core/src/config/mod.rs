//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;
mod worker;

pub use validation::ConfigError;
pub use worker::WorkerConfig;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the worker is scoped to, e.g. `https://app.example`.
    ///
    /// Set via SHELLCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to the resource manifest JSON produced by the build.
    ///
    /// Set via SHELLCACHE_MANIFEST_PATH environment variable.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,

    /// Resources staged on install, in fetch order.
    ///
    /// Set via SHELLCACHE_SHELL_RESOURCES environment variable (`[a,b,c]`).
    #[serde(default = "default_shell_resources")]
    pub shell_resources: Vec<String>,

    /// Prefix used to name the content, staging and manifest stores.
    ///
    /// Set via SHELLCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SHELLCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size accepted from the network.
    ///
    /// Set via SHELLCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SHELLCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("./build/web/resources.json")
}

fn default_shell_resources() -> Vec<String> {
    [
        "main.dart.js",
        "index.html",
        "flutter_bootstrap.js",
        "assets/AssetManifest.bin.json",
        "assets/FontManifest.json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_cache_prefix() -> String {
    "flutter".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            manifest_path: default_manifest_path(),
            shell_resources: default_shell_resources(),
            cache_prefix: default_cache_prefix(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration file cannot be read,
    /// environment variables cannot be parsed, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
