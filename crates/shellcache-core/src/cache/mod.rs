//! Named cache namespaces.
//!
//! The reconciler talks to storage only through the `CacheStorage` and
//! `Cache` traits. Two stores are provided:
//! - `MemoryCacheStorage`: volatile, for tests and embedding
//! - `DiskCacheStorage`: one JSON file per namespace, survives restarts

pub mod disk;
pub mod memory;
pub mod storage;

pub use disk::{DiskCacheStorage, NamespaceSummary, StoredEntry};
pub use memory::MemoryCacheStorage;
pub use storage::{Cache, CacheStorage, StorageError};
