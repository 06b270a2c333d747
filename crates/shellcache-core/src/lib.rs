//! Offline application-shell cache for web deployments.
//!
//! A build produces a manifest of every deployable resource and its content
//! fingerprint. The [`Reconciler`] keeps three cache namespaces in step with
//! that manifest across deployments:
//!
//! - staging: the core shell, downloaded fresh on install
//! - content: the live cache requests are answered from
//! - snapshot: the previous deployment's manifest
//!
//! On activation, content entries whose fingerprint is unchanged since the
//! snapshot are kept without re-downloading; changed and removed resources
//! are evicted and the staged shell is copied in.
//!
//! Storage, network and host signals are injected through the
//! [`CacheStorage`], [`Fetcher`] and [`WorkerHost`] traits.

pub mod cache;
pub mod config;
pub mod http;
pub mod manifest;
pub mod worker;

pub use cache::{Cache, CacheStorage, DiskCacheStorage, MemoryCacheStorage, StorageError};
pub use config::{CacheNames, ConfigError, WorkerConfig};
pub use http::{CacheMode, FetchError, Fetcher, HttpFetcher, Method, Request, Response, StaticFetcher};
pub use manifest::{CoreSet, Manifest, ROOT_KEY};
pub use worker::{
    ActivationOutcome, ControlMessage, FetchDecision, LoggingHost, MessageOutcome, ReconcileError,
    Reconciler, Route, WorkerHost,
};
