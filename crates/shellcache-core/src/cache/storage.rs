use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{Request, Response};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache namespace: {reason}")]
    Serialization { reason: String },

    #[error("Invalid namespace name: {0:?}")]
    InvalidName(String),

    #[error("Only GET requests can be cached, got {0}")]
    UnsupportedMethod(String),
}

/// A set of named cache namespaces.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if it doesn't exist yet.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError>;

    async fn has(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete a namespace and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Names of all existing namespaces, sorted.
    async fn names(&self) -> Result<Vec<String>, StorageError>;
}

/// One namespace: request URL → stored response.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, StorageError>;

    /// Store `response` under the request URL, replacing any previous entry.
    async fn put(&self, request: &Request, response: Response) -> Result<(), StorageError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, request: &Request) -> Result<bool, StorageError>;

    /// Stored requests in insertion order.
    async fn keys(&self) -> Result<Vec<Request>, StorageError>;
}

/// Whether two request URLs address the same entry. Fragments are ignored.
pub(crate) fn same_url(a: &str, b: &str) -> bool {
    without_fragment(a) == without_fragment(b)
}

fn without_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(before, _)| before)
}

pub(crate) fn ensure_cacheable(request: &Request) -> Result<(), StorageError> {
    if request.is_get() {
        Ok(())
    } else {
        Err(StorageError::UnsupportedMethod(request.method.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_url_ignores_fragment() {
        assert!(same_url("https://app.test/", "https://app.test/#/home"));
        assert!(same_url("https://app.test/a?v=1#x", "https://app.test/a?v=1"));
        assert!(!same_url("https://app.test/a?v=1", "https://app.test/a?v=2"));
        assert!(!same_url("https://app.test", "https://app.test/"));
    }
}
