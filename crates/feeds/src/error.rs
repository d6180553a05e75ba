//! Error types for market data operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching market data.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty series for {0}")]
    EmptySeries(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{label} unavailable after {attempts} attempts in {elapsed:?}: {last_error}")]
    Exhausted {
        label: String,
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::Parse(err.to_string())
        } else {
            FeedError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on retry.
    /// Only transient errors are retried by [`crate::retry`].
    pub fn is_transient(&self) -> bool {
        match self {
            // A garbled or HTML body behind a 200 is usually an upstream hiccup.
            FeedError::Http(_)
            | FeedError::Timeout(_)
            | FeedError::EmptySeries(_)
            | FeedError::Parse(_) => true,
            FeedError::Status { status, .. } => *status == 429 || *status >= 500,
            FeedError::UnknownSymbol(_) | FeedError::InvalidConfig(_) | FeedError::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
