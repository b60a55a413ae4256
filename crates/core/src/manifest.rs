//! Resource manifest and shell resource set.
//!
//! The manifest maps every resource the worker governs to the content
//! fingerprint it had at build time. It is produced externally and never
//! changes during the lifetime of a worker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Mapping from resource key to content fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
    resources: BTreeMap<String, String>,
}

impl ResourceManifest {
    /// Parse a manifest from its flat JSON object form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::ManifestInvalid(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::ManifestInvalid(e.to_string()))
    }

    /// Fingerprint recorded for `key`, if the manifest declares it.
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.resources.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceManifest {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { resources: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Resources that must be staged before the application can bootstrap.
///
/// Order is fixed at build time and carries no meaning beyond fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShellResources(Vec<String>);

impl ShellResources {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shell keys the manifest does not declare.
    pub fn missing_from<'a>(&'a self, manifest: &ResourceManifest) -> Vec<&'a str> {
        self.iter().filter(|key| !manifest.contains(key)).collect()
    }
}
