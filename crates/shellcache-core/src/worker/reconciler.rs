//! Lifecycle handlers keeping the cache namespaces in step with the manifest.
//!
//! - `install` stages the core shell into the staging namespace.
//! - `activate` migrates the content namespace from the previous deployment's
//!   manifest snapshot to the current manifest.
//! - `fetch` answers GET requests for manifest resources from the content
//!   namespace (online-first for the root document, cache-first otherwise).
//! - `handle_message` reacts to `skipWaiting` and `downloadOffline`.
//!
//! Namespaces are opened afresh by every handler; no handle is shared
//! between events.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use crate::cache::{Cache, CacheStorage};
use crate::config::WorkerConfig;
use crate::http::{CacheMode, Fetcher, Request, Response};
use crate::manifest::{Manifest, ROOT_KEY};

use super::keys::{request_key, stored_key};
use super::{ReconcileError, WorkerHost};

/// Result of an activation. Activation never fails outright: errors reset
/// the caches and are reported as [`ActivationOutcome::Reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// No snapshot existed; content was rebuilt from the staged shell.
    FirstRun { staged: usize },
    /// Content was migrated from the previous manifest.
    Upgraded {
        evicted: usize,
        retained: usize,
        staged: usize,
    },
    /// Something failed; all three namespaces were deleted.
    Reset { reason: String },
}

/// Answer to an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    Intercept(Response),
    /// Not ours; the host should perform its default network handling.
    PassThrough,
}

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PassThrough,
    OnlineFirst,
    CacheFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SkipWaiting,
    DownloadOffline,
}

impl ControlMessage {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "skipWaiting" => Some(ControlMessage::SkipWaiting),
            "downloadOffline" => Some(ControlMessage::DownloadOffline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Ignored,
    SkippedWaiting,
    /// Number of resources fetched by the offline download.
    Downloaded(usize),
}

pub struct Reconciler {
    config: WorkerConfig,
    origin: String,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
}

impl Reconciler {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        let origin = config.origin_str();
        Self {
            config,
            origin,
            storage,
            fetcher,
            host,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Serialized origin, without trailing slash.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    // ===== Install =====

    /// Stage the core shell, bypassing HTTP caches. Returns the number of
    /// files staged.
    pub async fn install(&self) -> Result<usize, ReconcileError> {
        self.host.skip_waiting().await;

        let staging = self.storage.open(&self.config.cache_names.staging).await?;
        let requests = self
            .config
            .core
            .iter()
            .map(|path| {
                self.config
                    .resolve(path)
                    .map(|url| Request::get(url).with_cache_mode(CacheMode::Reload))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let staged = self.add_all(staging.as_ref(), requests).await?;
        info!(staged, "Staged application shell");
        Ok(staged)
    }

    // ===== Activate =====

    pub async fn activate(&self) -> ActivationOutcome {
        match self.try_activate().await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The cache contents can't be trusted any more; start cold.
                error!(error = %e, "Failed to upgrade caches, resetting");
                let names = &self.config.cache_names;
                for name in [&names.content, &names.staging, &names.snapshot] {
                    if let Err(delete_err) = self.storage.delete(name).await {
                        warn!(namespace = %name, error = %delete_err, "Failed to delete namespace during reset");
                    }
                }
                ActivationOutcome::Reset {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_activate(&self) -> Result<ActivationOutcome, ReconcileError> {
        let names = &self.config.cache_names;
        let mut content = self.storage.open(&names.content).await?;
        let staging = self.storage.open(&names.staging).await?;
        let snapshot = self.storage.open(&names.snapshot).await?;

        let snapshot_request = Request::get(self.config.snapshot_url()?);
        let Some(previous) = snapshot.match_request(&snapshot_request).await? else {
            // Without a snapshot nothing in content can be vouched for.
            self.storage.delete(&names.content).await?;
            content = self.storage.open(&names.content).await?;

            let staged = Self::copy_entries(staging.as_ref(), content.as_ref()).await?;
            self.storage.delete(&names.staging).await?;
            self.save_snapshot(snapshot.as_ref(), &snapshot_request).await?;
            self.host.claim_clients().await;

            info!(staged, "First activation, content rebuilt from staged shell");
            return Ok(ActivationOutcome::FirstRun { staged });
        };

        let previous = Manifest::from_snapshot_json(&previous.body).map_err(ReconcileError::Snapshot)?;
        let manifest = &self.config.manifest;

        let mut evicted = 0;
        let mut retained = 0;
        for request in content.keys().await? {
            let stale = match stored_key(&self.origin, &request.url) {
                Some(key) => manifest.fingerprint_changed(&previous, &key),
                None => true,
            };
            if stale {
                debug!(url = %request.url, "Evicting stale entry");
                content.delete(&request).await?;
                evicted += 1;
            } else {
                retained += 1;
            }
        }

        // Staged shell files win over anything retained above
        let staged = Self::copy_entries(staging.as_ref(), content.as_ref()).await?;
        self.storage.delete(&names.staging).await?;
        self.save_snapshot(snapshot.as_ref(), &snapshot_request).await?;
        self.host.claim_clients().await;

        info!(evicted, retained, staged, "Upgraded content cache");
        Ok(ActivationOutcome::Upgraded {
            evicted,
            retained,
            staged,
        })
    }

    async fn copy_entries(from: &dyn Cache, to: &dyn Cache) -> Result<usize, ReconcileError> {
        let mut copied = 0;
        for request in from.keys().await? {
            if let Some(response) = from.match_request(&request).await? {
                to.put(&request, response).await?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    async fn save_snapshot(&self, snapshot: &dyn Cache, request: &Request) -> Result<(), ReconcileError> {
        let body = self
            .config
            .manifest
            .to_snapshot_json()
            .map_err(ReconcileError::Snapshot)?;
        let response = Response::ok(body).with_header("Content-Type", "application/json");
        snapshot.put(request, response).await?;
        Ok(())
    }

    // ===== Fetch =====

    pub fn route(&self, request: &Request) -> Route {
        if !request.is_get() {
            return Route::PassThrough;
        }
        match request_key(&self.origin, &request.url) {
            Some(key) if self.config.manifest.contains(&key) => {
                if key == ROOT_KEY {
                    Route::OnlineFirst
                } else {
                    Route::CacheFirst
                }
            }
            _ => Route::PassThrough,
        }
    }

    pub async fn fetch(&self, request: &Request) -> Result<FetchDecision, ReconcileError> {
        match self.route(request) {
            Route::PassThrough => Ok(FetchDecision::PassThrough),
            Route::OnlineFirst => self.online_first(request).await.map(FetchDecision::Intercept),
            Route::CacheFirst => self.cache_first(request).await.map(FetchDecision::Intercept),
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, ReconcileError> {
        let content = self.storage.open(&self.config.cache_names.content).await?;
        if let Some(cached) = content.match_request(request).await? {
            debug!(url = %request.url, "Serving from cache");
            return Ok(cached);
        }

        // Populate lazily, and only with successful responses
        let response = self.fetcher.fetch(request).await?;
        if response.is_ok() {
            if let Err(e) = content.put(request, response.clone()).await {
                warn!(url = %request.url, error = %e, "Failed to cache response");
            }
        }
        Ok(response)
    }

    /// Every root form (`origin`, `origin/`, `origin/#route`) shares the one
    /// entry under `origin/`.
    async fn online_first(&self, request: &Request) -> Result<Response, ReconcileError> {
        let root = Request::get(self.config.resolve(ROOT_KEY)?);
        let content = self.storage.open(&self.config.cache_names.content).await?;
        match self.fetcher.fetch(&root).await {
            Ok(response) => {
                if let Err(e) = content.put(&root, response.clone()).await {
                    warn!(url = %request.url, error = %e, "Failed to cache root document");
                }
                Ok(response)
            }
            Err(fetch_err) => match content.match_request(&root).await? {
                Some(cached) => {
                    debug!(url = %request.url, error = %fetch_err, "Offline, serving cached root document");
                    Ok(cached)
                }
                None => Err(fetch_err.into()),
            },
        }
    }

    // ===== Messages =====

    pub async fn handle_message(&self, data: &str) -> Result<MessageOutcome, ReconcileError> {
        match ControlMessage::parse(data) {
            Some(ControlMessage::SkipWaiting) => {
                self.host.skip_waiting().await;
                Ok(MessageOutcome::SkippedWaiting)
            }
            Some(ControlMessage::DownloadOffline) => {
                Ok(MessageOutcome::Downloaded(self.download_offline().await?))
            }
            None => {
                debug!(data, "Ignoring unknown message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    /// Fetch every manifest resource not yet in the content namespace.
    ///
    /// All or nothing: one failed fetch aborts the batch and nothing is
    /// stored.
    pub async fn download_offline(&self) -> Result<usize, ReconcileError> {
        let content = self.storage.open(&self.config.cache_names.content).await?;
        let present: HashSet<String> = content
            .keys()
            .await?
            .iter()
            .filter_map(|request| stored_key(&self.origin, &request.url))
            .collect();

        let missing = self
            .config
            .manifest
            .keys()
            .filter(|key| !present.contains(*key))
            .map(|key| self.config.resolve(key).map(Request::get))
            .collect::<Result<Vec<_>, _>>()?;

        let fetched = self.add_all(content.as_ref(), missing).await?;
        info!(fetched, "Offline download complete");
        Ok(fetched)
    }

    /// Fetch all requests, then store them. Any transport failure or non-OK
    /// status aborts before anything is written.
    async fn add_all(&self, cache: &dyn Cache, requests: Vec<Request>) -> Result<usize, ReconcileError> {
        let responses = try_join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await?;

        if let Some((request, response)) = requests
            .iter()
            .zip(&responses)
            .find(|(_, response)| !response.is_ok())
        {
            return Err(ReconcileError::BadStatus {
                url: request.url.clone(),
                status: response.status,
            });
        }

        let count = requests.len();
        for (request, response) in requests.into_iter().zip(responses) {
            cache.put(&request, response).await?;
        }
        Ok(count)
    }
}
