//! Request/response types and network fetchers.
//!
//! Responses are fully buffered so they can be cloned into a cache and
//! returned to the caller at the same time.

pub mod error;
pub mod fetcher;
pub mod static_fetcher;
pub mod types;

pub use error::FetchError;
pub use fetcher::{Fetcher, HttpFetcher};
pub use static_fetcher::StaticFetcher;
pub use types::{CacheMode, Method, Request, Response};
