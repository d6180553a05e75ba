//! Outbound side of the notifier.
//!
//! This crate provides:
//! - Message composition for status reports, alerts and failure notices
//! - Telegram delivery
//! - State persistence (JSON file, SQLite, in-memory)

pub mod compose;
pub mod db;
pub mod file_store;
pub mod store;
pub mod telegram;

pub use compose::{
    escape_markdown, failure_notice, format_number, format_signed, status_report,
    volatility_alert, LocalPrice, MarketSnapshot,
};
pub use db::SqliteStore;
pub use file_store::FileStore;
pub use store::{fresh_value, value_for, MemoryStore, StateKey, StateStore, StoreError};
pub use telegram::{DryRunNotifier, NotifyError, Notifier, TelegramNotifier};
