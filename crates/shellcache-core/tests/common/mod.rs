//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shellcache_core::{
    CacheStorage, CoreSet, Manifest, MemoryCacheStorage, Reconciler, Response, StaticFetcher,
    WorkerConfig, WorkerHost,
};

pub const ORIGIN: &str = "https://app.test";

/// Absolute URL for a manifest key.
pub fn url(key: &str) -> String {
    if key == "/" {
        format!("{}/", ORIGIN)
    } else {
        format!("{}/{}", ORIGIN, key)
    }
}

/// Host that counts the signals it receives.
#[derive(Default)]
pub struct CountingHost {
    pub skip_waiting: AtomicUsize,
    pub claims: AtomicUsize,
}

impl CountingHost {
    pub fn skip_waiting_count(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for CountingHost {
    async fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// One in-memory "browser": storage, network and host shared by every
/// deployment built from it.
pub struct Harness {
    pub storage: Arc<MemoryCacheStorage>,
    pub fetcher: Arc<StaticFetcher>,
    pub host: Arc<CountingHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MemoryCacheStorage::new()),
            fetcher: Arc::new(StaticFetcher::new()),
            host: Arc::new(CountingHost::default()),
        }
    }

    /// Serve `body` for every key, as the network would for this deployment.
    pub async fn publish(&self, files: &[(&str, &str)]) {
        for (key, body) in files {
            self.fetcher.set_route(url(key), Response::ok(*body)).await;
        }
    }

    pub fn deployment(&self, manifest: Manifest, core: &[&str]) -> Reconciler {
        let core: CoreSet = core.iter().copied().collect();
        let config = WorkerConfig::new(ORIGIN, manifest, core).expect("valid test config");
        Reconciler::new(
            config,
            self.storage.clone(),
            self.fetcher.clone(),
            self.host.clone(),
        )
    }

    /// URL → body of every entry in a namespace.
    pub async fn contents(&self, namespace: &str) -> BTreeMap<String, String> {
        let cache = self.storage.open(namespace).await.unwrap();
        let mut out = BTreeMap::new();
        for request in cache.keys().await.unwrap() {
            let response = cache.match_request(&request).await.unwrap().unwrap();
            out.insert(
                request.url.clone(),
                String::from_utf8(response.body).unwrap(),
            );
        }
        out
    }
}
