//! Retrying market data fetcher.
//!
//! Wraps a [`MarketDataProvider`] with the injected [`RetryPolicy`] and turns raw
//! series into quotes and range statistics. An empty series counts as a failed
//! attempt, so "unavailable" always surfaces as an `Err` the caller can inspect.

use crate::error::{FeedError, FeedResult};
use crate::exchange_rate::ExchangeRateProvider;
use crate::provider::{MarketDataProvider, PriceSeries, SeriesQuery};
use crate::retry::{retry, RetryPolicy};
use btc_notify_core::{Instrument, InstrumentQuote, RangeStat};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fallback window when the query span is not a fixed length.
const DEFAULT_RANGE_WINDOW: Duration = Duration::from_secs(90 * 86_400);

/// How the reference close for the change calculation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrevCloseStrategy {
    /// Last bar vs the bar before it in the same series.
    #[default]
    PreviousBar,
    /// Last bar vs the provider's previous-close field (current price when absent).
    ProviderPreviousClose,
}

/// Build a quote from a non-empty series.
///
/// Day high/low are taken over the whole series. Returns None for an empty series.
pub fn quote_from_series(
    symbol: &str,
    kind: Instrument,
    series: &PriceSeries,
    strategy: PrevCloseStrategy,
) -> Option<InstrumentQuote> {
    let latest = series.latest()?;
    let prev_close = match strategy {
        PrevCloseStrategy::PreviousBar => series.previous().map(|p| p.close),
        PrevCloseStrategy::ProviderPreviousClose => series.previous_close,
    }
    .unwrap_or(latest.close);

    Some(InstrumentQuote::from_prev_close(
        symbol,
        kind,
        latest.close,
        prev_close,
        series.low().unwrap_or(latest.low),
        series.high().unwrap_or(latest.high),
    ))
}

/// Market data fetcher with bounded retry.
pub struct MarketDataFetcher<P> {
    provider: Arc<P>,
    policy: RetryPolicy,
}

impl<P: MarketDataProvider> MarketDataFetcher<P> {
    pub fn new(provider: Arc<P>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Fetch a non-empty series, retrying transient failures.
    pub async fn series(&self, symbol: &str, query: &SeriesQuery) -> FeedResult<PriceSeries> {
        let label = format!("{} {}", symbol, query);
        let provider = &self.provider;

        retry(&self.policy, &label, move || async move {
            let series = provider.series(symbol, query).await?;
            if series.is_empty() {
                Err(FeedError::EmptySeries(symbol.to_string()))
            } else {
                Ok(series)
            }
        })
        .await
    }

    /// Current quote for an instrument.
    pub async fn quote(
        &self,
        symbol: &str,
        kind: Instrument,
        query: &SeriesQuery,
        strategy: PrevCloseStrategy,
    ) -> FeedResult<InstrumentQuote> {
        let series = self.series(symbol, query).await?;
        let quote = quote_from_series(symbol, kind, &series, strategy)
            .ok_or_else(|| FeedError::EmptySeries(symbol.to_string()))?;

        info!(
            symbol,
            kind = %kind,
            price = quote.price,
            change_pct = quote.change_pct,
            "Quote fetched"
        );
        Ok(quote)
    }

    /// High/low envelope over a long window.
    pub async fn range(&self, symbol: &str, query: &SeriesQuery) -> FeedResult<RangeStat> {
        let series = self.series(symbol, query).await?;
        let window = query.span().unwrap_or(DEFAULT_RANGE_WINDOW);
        let range = RangeStat::from_points(&series.points, window)
            .ok_or_else(|| FeedError::EmptySeries(symbol.to_string()))?;

        info!(
            symbol,
            high = range.high_over_window,
            low = range.low_over_window,
            "Range fetched"
        );
        Ok(range)
    }

    /// USD → `currency` rate from any rate source, under the same retry policy.
    pub async fn rate(
        &self,
        source: &dyn ExchangeRateProvider,
        currency: &str,
    ) -> FeedResult<f64> {
        let label = format!("USD/{} via {}", currency.to_uppercase(), source.name());
        retry(&self.policy, &label, move || source.usd_rate(currency)).await
    }
}
