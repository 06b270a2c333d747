//! Worker configuration.
//!
//! A `WorkerConfig` carries everything the build bakes into a deployment:
//! the origin the app is served from, the resource manifest, the core shell
//! files and the cache namespace names. It can be built in code or loaded
//! from a JSON build descriptor:
//!
//! ```json
//! {
//!   "origin": "https://app.example.com",
//!   "resources": { "index.html": "1137687bd22a40af9c5cf9328059ffa9", "/": "..." },
//!   "core": ["index.html", "main.dart.js"],
//!   "cacheNames": { "content": "flutter-app-cache" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::manifest::{CoreSet, Manifest};

/// Namespace holding the live content cache.
pub const DEFAULT_CONTENT_CACHE: &str = "flutter-app-cache";

/// Namespace the shell is staged into during install.
pub const DEFAULT_STAGING_CACHE: &str = "flutter-temp-cache";

/// Namespace holding the previous deployment's manifest.
pub const DEFAULT_SNAPSHOT_CACHE: &str = "flutter-app-manifest";

/// Path (relative to the origin) of the single snapshot entry.
const SNAPSHOT_ENTRY_PATH: &str = "manifest";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Core files missing from manifest: {}", .0.join(", "))]
    CoreNotInManifest(Vec<String>),

    #[error("Invalid cache names: {0}")]
    InvalidCacheNames(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheNames {
    pub content: String,
    pub staging: String,
    pub snapshot: String,
}

impl Default for CacheNames {
    fn default() -> Self {
        Self {
            content: DEFAULT_CONTENT_CACHE.to_string(),
            staging: DEFAULT_STAGING_CACHE.to_string(),
            snapshot: DEFAULT_SNAPSHOT_CACHE.to_string(),
        }
    }
}

impl CacheNames {
    fn validate(&self) -> Result<(), ConfigError> {
        let names = [&self.content, &self.staging, &self.snapshot];
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::InvalidCacheNames(
                "cache names must not be empty".to_string(),
            ));
        }
        if self.content == self.staging
            || self.content == self.snapshot
            || self.staging == self.snapshot
        {
            return Err(ConfigError::InvalidCacheNames(format!(
                "cache names must be distinct (content={}, staging={}, snapshot={})",
                self.content, self.staging, self.snapshot
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub origin: Url,
    #[serde(rename = "resources")]
    pub manifest: Manifest,
    #[serde(default)]
    pub core: CoreSet,
    #[serde(default)]
    pub cache_names: CacheNames,
}

impl WorkerConfig {
    /// Build and validate a config with the default cache names.
    pub fn new(origin: &str, manifest: Manifest, core: CoreSet) -> Result<Self, ConfigError> {
        let origin =
            Url::parse(origin).map_err(|e| ConfigError::InvalidOrigin(format!("{}: {}", origin, e)))?;
        let config = Self {
            origin,
            manifest,
            core,
            cache_names: CacheNames::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_cache_names(mut self, cache_names: CacheNames) -> Result<Self, ConfigError> {
        cache_names.validate()?;
        self.cache_names = cache_names;
        Ok(self)
    }

    /// Load and validate a JSON build descriptor.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.origin.scheme(), "http" | "https") || self.origin.host().is_none() {
            return Err(ConfigError::InvalidOrigin(format!(
                "{} is not an http(s) origin",
                self.origin
            )));
        }
        if self.origin.path() != "/" || self.origin.query().is_some() || self.origin.fragment().is_some() {
            return Err(ConfigError::InvalidOrigin(format!(
                "{} must not carry a path, query or fragment",
                self.origin
            )));
        }

        let missing = self.core.missing_from(&self.manifest);
        if !missing.is_empty() {
            return Err(ConfigError::CoreNotInManifest(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        self.cache_names.validate()?;

        let suspicious = self.manifest.suspicious_fingerprints();
        if !suspicious.is_empty() {
            warn!(count = suspicious.len(), first = suspicious[0], "Manifest has non-hash fingerprints");
        }
        Ok(())
    }

    /// Serialized origin without trailing slash, e.g. `https://app.example.com`.
    pub fn origin_str(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    /// Absolute URL of a path relative to the origin.
    pub fn resolve(&self, path: &str) -> Result<String, url::ParseError> {
        Ok(self.origin.join(path)?.to_string())
    }

    pub(crate) fn snapshot_url(&self) -> Result<String, url::ParseError> {
        self.resolve(SNAPSHOT_ENTRY_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest::from_iter([
            ("index.html", "1137687bd22a40af9c5cf9328059ffa9"),
            ("/", "1137687bd22a40af9c5cf9328059ffa9"),
            ("main.dart.js", "c1718677026a79197c39e8f086ab6f39"),
        ])
    }

    #[test]
    fn test_from_json_with_defaults() {
        let json = r#"{
            "origin": "https://app.test",
            "resources": {"index.html": "1137687bd22a40af9c5cf9328059ffa9", "/": "1137687bd22a40af9c5cf9328059ffa9"},
            "core": ["index.html"]
        }"#;
        let config = WorkerConfig::from_json(json).unwrap();
        assert_eq!(config.origin_str(), "https://app.test");
        assert_eq!(config.manifest.len(), 2);
        assert_eq!(config.cache_names, CacheNames::default());
        assert_eq!(config.snapshot_url().unwrap(), "https://app.test/manifest");
    }

    #[test]
    fn test_partial_cache_names() {
        let json = r#"{
            "origin": "https://app.test/",
            "resources": {},
            "cacheNames": {"content": "my-content"}
        }"#;
        let config = WorkerConfig::from_json(json).unwrap();
        assert_eq!(config.cache_names.content, "my-content");
        assert_eq!(config.cache_names.staging, DEFAULT_STAGING_CACHE);
    }

    #[test]
    fn test_core_must_be_in_manifest() {
        let core: CoreSet = ["index.html", "flutter_bootstrap.js"].into_iter().collect();
        let err = WorkerConfig::new("https://app.test", manifest(), core).unwrap_err();
        match err {
            ConfigError::CoreNotInManifest(missing) => {
                assert_eq!(missing, vec!["flutter_bootstrap.js".to_string()])
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_origins() {
        for origin in ["ftp://app.test", "https://app.test/sub/", "https://app.test/?x=1", "not a url"] {
            let result = WorkerConfig::new(origin, manifest(), CoreSet::default());
            assert!(matches!(result, Err(ConfigError::InvalidOrigin(_))), "{}", origin);
        }
    }

    #[test]
    fn test_cache_names_must_be_distinct() {
        let config = WorkerConfig::new("https://app.test", manifest(), CoreSet::default()).unwrap();
        let names = CacheNames {
            content: "same".to_string(),
            staging: "same".to_string(),
            snapshot: "other".to_string(),
        };
        assert!(matches!(
            config.with_cache_names(names),
            Err(ConfigError::InvalidCacheNames(_))
        ));
    }

    #[test]
    fn test_resolve_paths() {
        let config = WorkerConfig::new("https://app.test", manifest(), CoreSet::default()).unwrap();
        assert_eq!(config.resolve("/").unwrap(), "https://app.test/");
        assert_eq!(config.resolve("index.html").unwrap(), "https://app.test/index.html");
        assert_eq!(
            config.resolve("icons/Icon-192.png").unwrap(),
            "https://app.test/icons/Icon-192.png"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = WorkerConfig::load(Path::new("/nonexistent/shellcache.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
