use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::{ensure_cacheable, same_url, Cache, CacheStorage, StorageError};
use crate::http::{Request, Response};

/// Volatile namespace store.
///
/// Deleting a namespace detaches it: handles opened earlier keep working on
/// the orphaned entries, and the next `open` starts from empty.
#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<HashMap<String, Arc<MemoryCache>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError> {
        let mut namespaces = self.namespaces.write().await;
        let cache: Arc<dyn Cache> = namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::default()))
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.namespaces.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.namespaces.write().await.remove(name).is_some())
    }

    async fn names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<Vec<(Request, Response)>>,
}

#[async_trait]
impl Cache for MemoryCache {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|(stored, _)| same_url(&stored.url, &request.url))
            .map(|(_, response)| response.clone()))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), StorageError> {
        ensure_cacheable(request)?;
        let mut entries = self.entries.write().await;
        // Replacing moves the entry to the end, like a fresh insert.
        entries.retain(|(stored, _)| !same_url(&stored.url, &request.url));
        entries.push((request.clone(), response));
        Ok(())
    }

    async fn delete(&self, request: &Request) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(stored, _)| !same_url(&stored.url, &request.url));
        Ok(entries.len() != before)
    }

    async fn keys(&self) -> Result<Vec<Request>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(request, _)| request.clone())
            .collect())
    }
}
