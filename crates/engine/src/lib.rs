//! Alert decision engine.
//!
//! This crate decides whether a price move is large enough to raise a
//! volatility alert, taking the last delivered alert into account.

pub mod volatility;

pub use volatility::*;
