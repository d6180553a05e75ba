//! Key-value state persisted between runs.
//!
//! Reads never fail: a missing or unparsable value is simply absent. Writes
//! are best effort and report their error to the caller.

use async_trait::async_trait;
use btc_notify_core::CachedValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Values tracked across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Price at which the last volatility alert was delivered
    LastAlertPrice,
    /// Last known USD → local currency rate
    FxRate,
    /// Cached high of the long range window
    RangeHigh,
    /// Cached low of the long range window
    RangeLow,
}

impl StateKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::LastAlertPrice => "last_alert_price",
            StateKey::FxRate => "fx_rate",
            StateKey::RangeHigh => "range_high",
            StateKey::RangeLow => "range_low",
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence for scalar state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored value, or None when missing or unreadable.
    async fn get(&self, key: StateKey) -> Option<CachedValue>;

    /// Overwrite the stored value.
    async fn set(&self, key: StateKey, value: CachedValue) -> Result<(), StoreError>;

    async fn has(&self, key: StateKey) -> bool {
        self.get(key).await.is_some()
    }
}

/// Value of `key` recorded for `symbol`, whatever its age.
pub async fn value_for(store: &dyn StateStore, key: StateKey, symbol: &str) -> Option<CachedValue> {
    store.get(key).await.filter(|cached| cached.is_for(symbol))
}

/// Value of `key` for `symbol` if it was fetched less than `max_age` before `now`.
pub async fn fresh_value(
    store: &dyn StateStore,
    key: StateKey,
    symbol: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Option<f64> {
    value_for(store, key, symbol)
        .await
        .filter(|cached| cached.is_fresh(now, max_age))
        .map(|cached| cached.value)
}

/// In-process store. Used in tests and when the configured store cannot be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StateKey, CachedValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_values(values: impl IntoIterator<Item = (StateKey, CachedValue)>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: StateKey) -> Option<CachedValue> {
        self.values.lock().ok()?.get(&key).cloned()
    }

    async fn set(&self, key: StateKey, value: CachedValue) -> Result<(), StoreError> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key, value);
        }
        Ok(())
    }
}
