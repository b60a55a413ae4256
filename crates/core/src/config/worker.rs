//! Immutable per-version worker configuration.

use std::sync::Arc;

use super::validation::parse_origin;
use super::{AppConfig, ConfigError};
use crate::cache::CacheNames;
use crate::manifest::{ResourceManifest, ShellResources};

/// Everything a worker version is built with.
///
/// Built once at startup and shared read-only; a new manifest means a new
/// worker, never a mutation of this value.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Serialized origin, without trailing slash.
    pub origin: String,
    pub manifest: ResourceManifest,
    pub shell: ShellResources,
    pub names: CacheNames,
}

impl WorkerConfig {
    /// Build a worker configuration, checking that every shell resource is
    /// declared by the manifest.
    pub fn new(
        origin: &str, manifest: ResourceManifest, shell: ShellResources, names: CacheNames,
    ) -> Result<Arc<Self>, ConfigError> {
        let origin = parse_origin(origin)?;

        let missing = shell.missing_from(&manifest);
        if !missing.is_empty() {
            return Err(ConfigError::Invalid {
                field: "shell_resources".into(),
                reason: format!("not declared in manifest: {}", missing.join(", ")),
            });
        }

        Ok(Arc::new(Self { origin, manifest, shell, names }))
    }

    /// Read the manifest file named by `config` and build the worker
    /// configuration from it.
    pub fn from_app_config(config: &AppConfig) -> Result<Arc<Self>, ConfigError> {
        let bytes = std::fs::read(&config.manifest_path).map_err(|e| {
            ConfigError::LoadFailed(format!("cannot read manifest {}: {e}", config.manifest_path.display()))
        })?;
        let manifest = ResourceManifest::from_json(&bytes).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        Self::new(
            &config.origin,
            manifest,
            ShellResources::new(config.shell_resources.iter().cloned()),
            CacheNames::with_prefix(&config.cache_prefix),
        )
    }
}
