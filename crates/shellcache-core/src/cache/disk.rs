//! Persistent namespace store.
//!
//! Each namespace is one JSON file `<name>.json` in the store directory. The
//! file holds the entries in insertion order, each stamped with the time it
//! was stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::storage::{ensure_cacheable, same_url, Cache, CacheStorage, StorageError};
use crate::http::{Request, Response};

const NAMESPACE_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub request: Request,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            stored_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.stored_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }
}

/// Human readable age, e.g. "5m ago", "2h ago", "3d ago".
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Entry count and freshness of one namespace.
#[derive(Debug, Clone)]
pub struct NamespaceSummary {
    pub name: String,
    pub entries: usize,
    pub newest: Option<DateTime<Utc>>,
}

pub struct DiskCacheStorage {
    dir: PathBuf,
    // Serializes file access across every handle of this store.
    lock: Arc<Mutex<()>>,
}

impl DiskCacheStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self {
            dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn namespace_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", name, NAMESPACE_EXT)))
    }

    pub async fn summary(&self, name: &str) -> Result<NamespaceSummary, StorageError> {
        let path = self.namespace_path(name)?;
        let _guard = self.lock.lock().await;
        let entries = read_entries(&path)?;
        Ok(NamespaceSummary {
            name: name.to_string(),
            entries: entries.len(),
            newest: entries.iter().map(|e| e.stored_at).max(),
        })
    }

    /// All entries of a namespace, with their storage timestamps.
    pub async fn entries(&self, name: &str) -> Result<Vec<StoredEntry>, StorageError> {
        let path = self.namespace_path(name)?;
        let _guard = self.lock.lock().await;
        read_entries(&path)
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError> {
        let path = self.namespace_path(name)?;
        let _guard = self.lock.lock().await;
        if !path.exists() {
            write_entries(&path, &[])?;
            debug!(namespace = name, "Created cache namespace");
        }
        Ok(Arc::new(DiskCache {
            path,
            lock: self.lock.clone(),
        }))
    }

    async fn has(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.namespace_path(name)?;
        let _guard = self.lock.lock().await;
        Ok(path.exists())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.namespace_path(name)?;
        let _guard = self.lock.lock().await;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| StorageError::Io { path, source: e })?;
        Ok(true)
    }

    async fn names(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().await;
        let read_dir = std::fs::read_dir(&self.dir).map_err(|e| StorageError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StorageError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NAMESPACE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Handle to one namespace file.
///
/// A handle outliving a `delete` of its namespace recreates the file on the
/// next write.
pub struct DiskCache {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

#[async_trait]
impl Cache for DiskCache {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(read_entries(&self.path)?
            .into_iter()
            .find(|e| same_url(&e.request.url, &request.url))
            .map(|e| e.response))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), StorageError> {
        ensure_cacheable(request)?;
        let _guard = self.lock.lock().await;
        let mut entries = read_entries(&self.path)?;
        entries.retain(|e| !same_url(&e.request.url, &request.url));
        entries.push(StoredEntry::new(request.clone(), response));
        write_entries(&self.path, &entries)
    }

    async fn delete(&self, request: &Request) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = read_entries(&self.path)?;
        let before = entries.len();
        entries.retain(|e| !same_url(&e.request.url, &request.url));
        if entries.len() == before {
            return Ok(false);
        }
        write_entries(&self.path, &entries)?;
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<Request>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(read_entries(&self.path)?
            .into_iter()
            .map(|e| e.request)
            .collect())
    }
}

fn read_entries(path: &Path) -> Result<Vec<StoredEntry>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read(path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&contents).map_err(|e| StorageError::Serialization {
        reason: format!("{}: {}", path.display(), e),
    })
}

fn write_entries(path: &Path, entries: &[StoredEntry]) -> Result<(), StorageError> {
    let contents = serde_json::to_vec(entries).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    // Write then rename so a crash never leaves a truncated namespace behind
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents).map_err(|e| StorageError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-3), "just now");
        assert_eq!(age_display(0), "just now");
        assert_eq!(age_display(5), "5m ago");
        assert_eq!(age_display(89), "1h ago");
        assert_eq!(age_display(90), "2h ago");
        assert_eq!(age_display(1440 + 11 * 60), "1d ago");
        assert_eq!(age_display(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_stored_entry_age() {
        let mut entry = StoredEntry::new(Request::get("https://app.test/"), Response::ok("x"));
        assert_eq!(entry.age_display(), "just now");
        entry.stored_at = Utc::now() - Duration::minutes(61);
        assert_eq!(entry.age_display(), "1h ago");
    }

    #[tokio::test]
    async fn test_invalid_namespace_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        for name in ["", ".hidden", "../escape", "a/b"] {
            assert!(matches!(
                storage.open(name).await,
                Err(StorageError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_corrupt_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let cache = storage.open("broken").await.unwrap();
        let err = cache.keys().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_names_ignore_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("flutter-app-cache").await.unwrap();
        storage.open("flutter-temp-cache").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        assert_eq!(
            storage.names().await.unwrap(),
            vec!["flutter-app-cache", "flutter-temp-cache"]
        );
    }

    #[tokio::test]
    async fn test_lookup_ignores_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        let cache = storage.open("content").await.unwrap();
        cache
            .put(&Request::get("https://app.test/"), Response::ok("root"))
            .await
            .unwrap();

        let found = cache
            .match_request(&Request::get("https://app.test/#/home"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, b"root");
        assert!(cache.delete(&Request::get("https://app.test/#/other")).await.unwrap());
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_has_and_names_track_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().to_path_buf()).unwrap();
        storage.open("flutter-app-cache").await.unwrap();
        assert!(storage.has("flutter-app-cache").await.unwrap());

        assert!(storage.delete("flutter-app-cache").await.unwrap());
        assert!(!storage.has("flutter-app-cache").await.unwrap());
        assert!(storage.names().await.unwrap().is_empty());
    }
}
