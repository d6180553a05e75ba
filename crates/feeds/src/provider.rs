//! Market data provider abstraction.

use crate::error::FeedResult;
use async_trait::async_trait;
use btc_notify_core::PricePoint;
use std::time::Duration;

/// Span and bar granularity of a series request, in provider notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    /// Span, e.g. "1d", "5d", "3mo"
    pub range: String,
    /// Bar size, e.g. "1m", "1h", "1d"
    pub interval: String,
}

impl SeriesQuery {
    pub fn new(range: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            interval: interval.into(),
        }
    }

    /// One day of hourly bars.
    pub fn intraday() -> Self {
        Self::new("1d", "1h")
    }

    /// Three months of daily bars.
    pub fn three_months() -> Self {
        Self::new("3mo", "1d")
    }

    /// Approximate length of the requested span.
    /// Returns None for spans the provider understands but we do not model ("max", "ytd").
    pub fn span(&self) -> Option<Duration> {
        let s = self.range.trim();
        let split = s.find(|c: char| !c.is_ascii_digit())?;
        let (count, unit) = s.split_at(split);
        let count: u64 = count.parse().ok()?;
        let days = match unit {
            "d" => count,
            "wk" => count * 7,
            "mo" => count * 30,
            "y" => count * 365,
            _ => return None,
        };
        Some(Duration::from_secs(days * 86_400))
    }
}

impl std::fmt::Display for SeriesQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.range, self.interval)
    }
}

/// Bars returned for one query, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
    /// Provider-reported close of the session before the series started
    pub previous_close: Option<f64>,
}

impl PriceSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Second-to-last bar, if the series has more than one.
    pub fn previous(&self) -> Option<&PricePoint> {
        let n = self.points.len();
        if n > 1 {
            self.points.get(n - 2)
        } else {
            None
        }
    }

    /// Max high over all bars.
    pub fn high(&self) -> Option<f64> {
        self.points.iter().map(|p| p.high).reduce(f64::max)
    }

    /// Min low over all bars.
    pub fn low(&self) -> Option<f64> {
        self.points.iter().map(|p| p.low).reduce(f64::min)
    }
}

/// Source of bar series for a symbol.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Fetch a series. An empty result is returned as `Ok` with no points;
    /// the fetcher decides whether that is usable.
    async fn series(&self, symbol: &str, query: &SeriesQuery) -> FeedResult<PriceSeries>;
}
