//! Core data types for the BTC price notifier.

pub mod cache;
pub mod instrument;
pub mod price;

pub use cache::*;
pub use instrument::*;
pub use price::*;
