use thiserror::Error;

use crate::cache::StorageError;
use crate::http::FetchError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unreadable manifest snapshot: {0}")]
    Snapshot(#[source] serde_json::Error),

    #[error("Invalid resource URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request for {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },
}
