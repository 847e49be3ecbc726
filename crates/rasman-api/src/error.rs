use std::time::Duration;

use thiserror::Error;

/// Why a management API call did not produce a usable answer.
///
/// These never reach the console as errors: every public call on
/// [`crate::ApiClient`] logs the failure and collapses it to `None` or
/// `false`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No API URL configured")]
    NotConfigured,

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server responded {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed payload: {0}")]
    Payload(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout)
        } else if err.is_decode() {
            ApiError::Payload(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }

    /// The server could not be talked to at all (as opposed to answering
    /// with something we did not like).
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ApiError::NotConfigured
                | ApiError::InvalidUrl(_)
                | ApiError::Timeout(_)
                | ApiError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
