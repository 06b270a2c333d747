//! Network access for the reconciler.
//!
//! `Fetcher` is the seam between the reconciler and the network. The
//! production implementation is `HttpFetcher`; tests use `StaticFetcher`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::{CacheMode, FetchError, Method, Request, Response};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses on large bundles while still failing a hung fetch.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Performs a network fetch.
///
/// Implementations reject only when no response could be obtained at all.
/// Error statuses come back as `Ok(Response)` so callers can decide whether
/// to keep them.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an already configured client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: &Method) -> Result<reqwest::Method, FetchError> {
        reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|_| FetchError::UnsupportedMethod(method.to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self.client.request(Self::method(&request.method)?, url);
        if request.cache_mode == CacheMode::Reload {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "Fetched");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(HttpFetcher::method(&Method::Get).unwrap(), reqwest::Method::GET);
        assert_eq!(
            HttpFetcher::method(&Method::Other("PATCH".to_string())).unwrap(),
            reqwest::Method::PATCH
        );
        assert!(matches!(
            HttpFetcher::method(&Method::Other("BAD METHOD".to_string())),
            Err(FetchError::UnsupportedMethod(m)) if m == "BAD METHOD"
        ));
    }
}
