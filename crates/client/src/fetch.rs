//! The read side of the executor boundary.

use async_trait::async_trait;
use striker_core::error::CoreError;

/// Errors from a single read of a polled resource.
///
/// Cloneable because the poller keeps the latest one next to the stale
/// value for every subscriber to inspect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (connect, DNS, timeout).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The executor answered with a non-2xx status.
    #[error("Executor returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    InvalidPath(#[from] CoreError),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Reads the resource identified by `key` (an executor path).
#[async_trait]
pub trait Fetcher<R>: Send + Sync + 'static {
    async fn fetch(&self, key: &str) -> Result<R, FetchError>;
}
