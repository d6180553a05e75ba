//! Bounded retry for provider calls.
//!
//! A call is attempted repeatedly until it succeeds, fails with a permanent
//! error, or the wall-clock budget runs out. Attempts are spaced by a fixed
//! poll interval.
//!
//! ## Example
//!
//! ```rust
//! use btc_notify_feeds::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_duration(), Duration::from_secs(180));
//! assert_eq!(policy.poll_interval(), Duration::from_secs(5));
//! ```

use crate::error::{FeedError, FeedResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Retry budget injected into the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total wall-clock budget for one fetch (default: 180s)
    max_duration: Duration,
    /// Sleep between attempts (default: 5s)
    poll_interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_duration: Duration, poll_interval: Duration) -> Self {
        Self {
            max_duration,
            poll_interval,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(180),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Run `op` under `policy`.
///
/// Transient errors are logged and retried. A permanent error is returned as
/// is. When the budget is spent the result is [`FeedError::Exhausted`].
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> FeedResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FeedResult<T>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(
                        source = label,
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Fetch succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                warn!(source = label, error = %e, "Fetch failed with permanent error");
                return Err(e);
            }
            Err(e) => {
                let elapsed = started.elapsed();
                if elapsed >= policy.max_duration {
                    warn!(
                        source = label,
                        attempts,
                        elapsed_secs = elapsed.as_secs(),
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(FeedError::Exhausted {
                        label: label.to_string(),
                        attempts,
                        elapsed,
                        last_error: e.to_string(),
                    });
                }
                debug!(
                    source = label,
                    attempt = attempts,
                    error = %e,
                    "Fetch attempt failed, retrying in {:?}",
                    policy.poll_interval
                );
                tokio::time::sleep(policy.poll_interval).await;
            }
        }
    }
}
