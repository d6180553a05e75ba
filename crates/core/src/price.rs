//! Price data structures for bar series and derived quotes.

use crate::Instrument;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One bar of a provider time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64, high: f64, low: f64) -> Self {
        Self {
            timestamp,
            close,
            high,
            low,
        }
    }
}

/// Sign of a price change, used to pick the message glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else if change < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Direction::Up => "🟢",
            Direction::Down => "🔴",
            Direction::Flat => "⚪",
        }
    }
}

/// Current price of an instrument with its change against a previous close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentQuote {
    /// Provider symbol (e.g., "BTC-USD", "GC=F")
    pub symbol: CompactString,
    pub kind: Instrument,
    pub price: f64,
    /// Absolute change: price - previous close
    pub change: f64,
    /// Signed percentage change against the previous close
    pub change_pct: f64,
    pub day_low: f64,
    pub day_high: f64,
}

impl InstrumentQuote {
    /// Build a quote from the current price and the reference close.
    ///
    /// A zero or non-finite `prev_close` yields a zero percentage instead of
    /// dividing by it.
    pub fn from_prev_close(
        symbol: &str,
        kind: Instrument,
        price: f64,
        prev_close: f64,
        day_low: f64,
        day_high: f64,
    ) -> Self {
        let change = price - prev_close;
        let change_pct = if prev_close != 0.0 && prev_close.is_finite() {
            change / prev_close * 100.0
        } else {
            0.0
        };

        Self {
            symbol: CompactString::new(symbol),
            kind,
            price,
            change,
            change_pct,
            day_low,
            day_high,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_change(self.change)
    }
}

/// High/low envelope over a long window of daily bars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeStat {
    pub high_over_window: f64,
    pub low_over_window: f64,
    pub window: Duration,
}

impl RangeStat {
    /// Reduce a series to its max high and min low. Empty series → None.
    pub fn from_points(points: &[PricePoint], window: Duration) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let high = points
            .iter()
            .map(|p| p.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let low = points.iter().map(|p| p.low).fold(f64::INFINITY, f64::min);

        Some(Self {
            high_over_window: high,
            low_over_window: low,
            window,
        })
    }

    /// Window length in whole days.
    pub fn window_days(&self) -> u64 {
        self.window.as_secs() / 86_400
    }
}
