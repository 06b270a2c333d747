use thiserror::Error;

/// Transport-level fetch failure.
///
/// HTTP error statuses are not errors here: a 404 is still a response.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}
