//! JSON document store in the working directory.
//!
//! Layout:
//!
//! ```json
//! {
//!   "last_alert_price": { "value": 64210.5, "fetched_at": "2025-05-01T08:00:00Z" },
//!   "fx_rate": { "value": 36.42, "fetched_at": "2025-05-01T08:00:00Z", "symbol": "THB" }
//! }
//! ```

use crate::store::{StateKey, StateStore, StoreError};
use async_trait::async_trait;
use btc_notify_core::CachedValue;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, warn};

/// State kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current document. Missing or corrupt files read as empty.
    async fn load(&self) -> Map<String, Value> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "State file not readable");
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(path = %self.path.display(), "State file is not a JSON object, ignoring");
                Map::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is corrupt, ignoring");
                Map::new()
            }
        }
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: StateKey) -> Option<CachedValue> {
        let mut doc = self.load().await;
        let entry = doc.remove(key.as_str())?;

        match serde_json::from_value::<CachedValue>(entry) {
            Ok(cached) if cached.value.is_finite() => Some(cached),
            Ok(cached) => {
                warn!(key = %key, value = cached.value, "Stored value is not finite, ignoring");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Stored value is unreadable, ignoring");
                None
            }
        }
    }

    async fn set(&self, key: StateKey, value: CachedValue) -> Result<(), StoreError> {
        let mut doc = self.load().await;
        doc.insert(key.as_str().to_string(), serde_json::to_value(&value)?);
        let text = serde_json::to_string_pretty(&Value::Object(doc))?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(key = %key, value = value.value, "State saved");
        Ok(())
    }
}
