//! SQLite-backed state store.

use crate::store::{StateKey, StateStore, StoreError};
use async_trait::async_trait;
use btc_notify_core::CachedValue;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, warn};

/// State kept in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to SQLite database at the given URL (e.g. `sqlite://state.db`).
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Single writer per run.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open the database file at `path`.
    pub async fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        Self::connect(&format!("sqlite://{}", path.display())).await
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value REAL NOT NULL,
                fetched_at TEXT NOT NULL,
                symbol TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool, flushing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, key: StateKey) -> Option<CachedValue> {
        let row = sqlx::query_as::<_, (f64, String, Option<String>)>(
            "SELECT value, fetched_at, symbol FROM state WHERE key = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await;

        let (value, fetched_at, symbol) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "State read failed, treating as absent");
                return None;
            }
        };

        match DateTime::parse_from_rfc3339(&fetched_at) {
            Ok(ts) if value.is_finite() => Some(CachedValue {
                value,
                fetched_at: ts.with_timezone(&Utc),
                symbol: symbol.map(Into::into),
            }),
            Ok(_) => {
                warn!(key = %key, value, "Stored value is not finite, ignoring");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Stored timestamp is unreadable, ignoring");
                None
            }
        }
    }

    async fn set(&self, key: StateKey, value: CachedValue) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO state (key, value, fetched_at, symbol)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value, fetched_at = excluded.fetched_at,
                symbol = excluded.symbol
            "#,
        )
        .bind(key.as_str())
        .bind(value.value)
        .bind(value.fetched_at.to_rfc3339())
        .bind(value.symbol.as_deref())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, value = value.value, "State saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_store_connect() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.get(StateKey::LastAlertPrice).await.is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_upsert() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

        store.set(StateKey::FxRate, CachedValue::new(36.1, t0())).await.unwrap();
        store
            .set(StateKey::FxRate, CachedValue::new(36.4, t0() + chrono::Duration::minutes(5)))
            .await
            .unwrap();

        let cached = store.get(StateKey::FxRate).await.unwrap();
        assert_eq!(cached.value, 36.4);
        assert_eq!(cached.fetched_at, t0() + chrono::Duration::minutes(5));
        assert!(!store.has(StateKey::RangeHigh).await);
    }

    #[tokio::test]
    async fn test_sqlite_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store
            .set(StateKey::LastAlertPrice, CachedValue::new(64_000.0, t0()))
            .await
            .unwrap();
        store
            .set(StateKey::RangeHigh, CachedValue::new(73_000.0, t0()).with_symbol("BTC-USD"))
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(StateKey::LastAlertPrice).await,
            Some(CachedValue::new(64_000.0, t0()))
        );
        assert_eq!(
            reopened.get(StateKey::RangeHigh).await,
            Some(CachedValue::new(73_000.0, t0()).with_symbol("BTC-USD"))
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_bad_timestamp_reads_absent() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO state (key, value, fetched_at) VALUES (?, ?, ?)")
            .bind(StateKey::RangeLow.as_str())
            .bind(50_000.0)
            .bind("yesterday")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.get(StateKey::RangeLow).await.is_none());
    }
}
