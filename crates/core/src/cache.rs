//! Persisted value with the time it was fetched.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scalar cached across runs together with its fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    pub value: f64,
    pub fetched_at: DateTime<Utc>,
    /// Symbol or currency the value was fetched for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<CompactString>,
}

impl CachedValue {
    pub fn new(value: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            symbol: None,
        }
    }

    /// Tag the value with the symbol it belongs to.
    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(CompactString::new(symbol));
        self
    }

    /// True only when the value was recorded for `symbol`. Untagged values match nothing.
    pub fn is_for(&self, symbol: &str) -> bool {
        self.symbol.as_deref() == Some(symbol)
    }

    /// Age of the value at `now`. Timestamps in the future count as zero age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Fresh while `now - fetched_at < max_age`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) < max_age
    }
}
