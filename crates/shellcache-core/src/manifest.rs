//! Resource manifest and core shell set.
//!
//! The manifest maps every deployable resource path to the content
//! fingerprint the build produced for it. A copy of the manifest from the
//! previous deployment is kept in the snapshot namespace, and comparing the
//! two decides which cached entries survive an upgrade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Cache key for the application root document.
pub const ROOT_KEY: &str = "/";

/// Length of a build fingerprint (hex encoded MD5).
const FINGERPRINT_LEN: usize = 32;

/// Mapping from resource path to content fingerprint.
///
/// Serializes as a flat JSON object, the same shape the build emits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a cached entry for `key` must be dropped when upgrading from
    /// `previous` to this manifest.
    ///
    /// True when the key is no longer deployed, or when its fingerprint
    /// differs from the one recorded in `previous` (a key the previous
    /// manifest never had counts as changed).
    pub fn fingerprint_changed(&self, previous: &Manifest, key: &str) -> bool {
        match self.get(key) {
            None => true,
            Some(current) => previous.get(key) != Some(current),
        }
    }

    /// Keys whose fingerprint doesn't look like a build hash.
    pub fn suspicious_fingerprints(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, hash)| {
                hash.len() != FINGERPRINT_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit())
            })
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Serialize for storage in the snapshot namespace.
    pub fn to_snapshot_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a manifest previously written by [`Manifest::to_snapshot_json`].
    pub fn from_snapshot_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Shell files that must be staged before the worker is ready.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoreSet(Vec<String>);

impl CoreSet {
    pub fn new(paths: Vec<String>) -> Self {
        Self(paths)
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

    /// Core paths that are missing from `manifest`.
    pub fn missing_from<'a>(&'a self, manifest: &Manifest) -> Vec<&'a str> {
        self.iter().filter(|path| !manifest.contains(path)).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for CoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
