use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{FetchError, Fetcher, Request, Response};

/// In-memory fetcher serving canned responses.
///
/// Unknown URLs answer 404. While offline every fetch fails with
/// `FetchError::Unreachable`. Each fetch attempt is counted per URL.
#[derive(Default)]
pub struct StaticFetcher {
    routes: Mutex<HashMap<String, Response>>,
    hits: Mutex<HashMap<String, usize>>,
    offline: AtomicBool,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, url: impl Into<String>, response: Response) -> Self {
        self.routes.get_mut().insert(url.into(), response);
        self
    }

    pub async fn set_route(&self, url: impl Into<String>, response: Response) {
        self.routes.lock().await.insert(url.into(), response);
    }

    pub async fn remove_route(&self, url: &str) {
        self.routes.lock().await.remove(url);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches attempted for `url`.
    pub async fn hits(&self, url: &str) -> usize {
        self.hits.lock().await.get(url).copied().unwrap_or(0)
    }

    /// Total fetches attempted.
    pub async fn total_hits(&self) -> usize {
        self.hits.lock().await.values().sum()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        *self.hits.lock().await.entry(request.url.clone()).or_insert(0) += 1;

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable(request.url.clone()));
        }

        Ok(self
            .routes
            .lock()
            .await
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "Not Found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher_routes_and_counts() {
        let fetcher = StaticFetcher::new().with_route("https://app.test/a.js", Response::ok("a"));

        let found = fetcher.fetch(&Request::get("https://app.test/a.js")).await.unwrap();
        assert_eq!(found.body, b"a");

        let missing = fetcher.fetch(&Request::get("https://app.test/b.js")).await.unwrap();
        assert_eq!(missing.status, 404);

        fetcher.set_offline(true);
        assert!(fetcher.fetch(&Request::get("https://app.test/a.js")).await.is_err());

        assert_eq!(fetcher.hits("https://app.test/a.js").await, 2);
        assert_eq!(fetcher.total_hits().await, 3);
    }
}
