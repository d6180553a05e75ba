//! State store selection.

use btc_notify_alerts::{FileStore, MemoryStore, SqliteStore, StateStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Backend implied by the state path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Json,
    Sqlite,
}

impl StoreKind {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("db") || ext.eq_ignore_ascii_case("sqlite") => {
                StoreKind::Sqlite
            }
            _ => StoreKind::Json,
        }
    }
}

/// Open the configured store. Falls back to an in-memory store when it cannot
/// be opened, so the run still reports (without dedup across runs).
pub async fn open_store(path: &Path) -> Arc<dyn StateStore> {
    match StoreKind::for_path(path) {
        StoreKind::Json => {
            info!(path = %path.display(), "Using JSON state file");
            Arc::new(FileStore::new(path))
        }
        StoreKind::Sqlite => match SqliteStore::open(path).await {
            Ok(store) => {
                info!(path = %path.display(), "Using SQLite state database");
                Arc::new(store)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "State database unavailable, state will not persist");
                Arc::new(MemoryStore::new())
            }
        },
    }
}
