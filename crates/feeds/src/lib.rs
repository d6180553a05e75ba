//! Market data collection for the notifier.
//!
//! ## Architecture
//!
//! - `provider` - `MarketDataProvider` trait and series types
//! - `yahoo` - Yahoo Finance chart client
//! - `exchange_rate` - interchangeable USD rate sources
//! - `retry` - bounded retry with transient/permanent classification
//! - `fetcher` - retrying fetcher producing quotes and range statistics

pub mod error;
pub mod exchange_rate;
pub mod fetcher;
pub mod provider;
pub mod retry;
pub mod yahoo;

#[cfg(test)]
mod test_http;

pub use error::*;
pub use exchange_rate::*;
pub use fetcher::*;
pub use provider::*;
pub use retry::*;
pub use yahoo::*;
