use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single HTTP attempt.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("response body is not valid JSON: {0}")]
    Body(#[source] reqwest::Error),
}

impl AttemptError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AttemptError::Status(status) => Some(*status),
            AttemptError::Transport(err) | AttemptError::Body(err) => err.status(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// The overall deadline elapsed; any in-flight attempt was dropped.
    #[error("timed out after {after:?} fetching {url}")]
    Timeout { url: String, after: Duration },

    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: AttemptError,
    },

    /// A client error that retrying cannot fix.
    #[error("request to {url} rejected with status {status}")]
    Rejected { url: String, status: StatusCode },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The response arrived but does not have the expected shape.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
