//! One notifier run: fetch, evaluate, compose, notify, persist.

use crate::config::AppConfig;
use btc_notify_alerts::{
    failure_notice, fresh_value, status_report, value_for, volatility_alert, LocalPrice,
    MarketSnapshot, Notifier, StateKey, StateStore,
};
use btc_notify_core::{CachedValue, Instrument, InstrumentQuote, RangeStat};
use btc_notify_engine::{AlertDecision, VolatilityEvaluator};
use btc_notify_feeds::{
    ExchangeRateProvider, FeedError, MarketDataFetcher, MarketDataProvider, PrevCloseStrategy,
    RetryPolicy, SeriesQuery,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const RANGE_WINDOW: Duration = Duration::from_secs(90 * 86_400);

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{what} unavailable: {cause}")]
    Unavailable {
        what: String,
        #[source]
        cause: FeedError,
    },
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub price: f64,
    pub change_pct: f64,
    pub status_sent: bool,
    pub decision: AlertDecision,
    pub alert_sent: bool,
}

/// Wires the components of a single run.
pub struct Runner<P> {
    config: AppConfig,
    fetcher: MarketDataFetcher<P>,
    rates: Arc<dyn ExchangeRateProvider>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    evaluator: VolatilityEvaluator,
    host: String,
}

impl<P: MarketDataProvider> Runner<P> {
    pub fn new(
        config: AppConfig,
        provider: Arc<P>,
        rates: Arc<dyn ExchangeRateProvider>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let policy = RetryPolicy::new(config.retry_timeout(), config.retry_wait());
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            fetcher: MarketDataFetcher::new(provider, policy),
            evaluator: VolatilityEvaluator::new(config.volatility()),
            config,
            rates,
            notifier,
            store,
            host,
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetcher = MarketDataFetcher::new(self.fetcher.provider().clone(), policy);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, RunError> {
        let symbol = self.config.btc_symbol.as_str();
        let intraday = SeriesQuery::intraday();

        let btc = match self
            .fetcher
            .quote(symbol, Instrument::Bitcoin, &intraday, PrevCloseStrategy::PreviousBar)
            .await
        {
            Ok(quote) => quote,
            Err(e) => return Err(self.fail(format!("{} {}", symbol, intraday), e, now).await),
        };

        let range = self.resolve_range(now).await?;

        let mut snapshot = MarketSnapshot::new(btc, now);
        snapshot.range = Some(range);
        snapshot.local_price = self
            .resolve_fx_rate(now)
            .await
            .map(|rate| LocalPrice::convert(snapshot.btc.price, &self.config.local_currency, rate));
        snapshot.references = self.fetch_references().await;

        let status_sent = self.deliver("status report", &status_report(&snapshot)).await;

        let last_alert_price = self
            .store
            .get(StateKey::LastAlertPrice)
            .await
            .map(|cached| cached.value);
        let decision =
            self.evaluator
                .evaluate(snapshot.btc.price, snapshot.btc.change_pct, last_alert_price);
        info!(?decision, last_alert_price, "Volatility evaluated");

        let mut alert_sent = false;
        if decision.should_fire() {
            let alert = volatility_alert(&snapshot, self.evaluator.threshold_pct());
            alert_sent = self.deliver("volatility alert", &alert).await;

            if alert_sent && !self.config.dry_run {
                let record = CachedValue::new(snapshot.btc.price, now);
                if let Err(e) = self.store.set(StateKey::LastAlertPrice, record).await {
                    warn!(error = %e, "Failed to record last alert price");
                }
            }
        }

        Ok(RunSummary {
            price: snapshot.btc.price,
            change_pct: snapshot.btc.change_pct,
            status_sent,
            decision,
            alert_sent,
        })
    }

    /// 3-month high/low: cached value while fresh, refetched otherwise, stale
    /// value when the refetch fails. Cached values of another symbol are ignored.
    async fn resolve_range(&self, now: DateTime<Utc>) -> Result<RangeStat, RunError> {
        let store = self.store.as_ref();
        let symbol = self.config.btc_symbol.as_str();
        let refresh = self.config.range_refresh();

        let high = fresh_value(store, StateKey::RangeHigh, symbol, refresh, now).await;
        let low = fresh_value(store, StateKey::RangeLow, symbol, refresh, now).await;
        if let (Some(high), Some(low)) = (high, low) {
            info!(high, low, "Using cached range");
            return Ok(range_stat(high, low));
        }

        let query = SeriesQuery::three_months();
        match self.fetcher.range(symbol, &query).await {
            Ok(range) => {
                for (key, value) in [
                    (StateKey::RangeHigh, range.high_over_window),
                    (StateKey::RangeLow, range.low_over_window),
                ] {
                    let cached = CachedValue::new(value, now).with_symbol(symbol);
                    if let Err(e) = store.set(key, cached).await {
                        warn!(key = %key, error = %e, "Failed to cache range");
                    }
                }
                Ok(range)
            }
            Err(e) => {
                let stale_high = value_for(store, StateKey::RangeHigh, symbol).await;
                let stale_low = value_for(store, StateKey::RangeLow, symbol).await;
                match (stale_high, stale_low) {
                    (Some(high), Some(low)) => {
                        warn!(error = %e, fetched_at = %high.fetched_at, "Range refresh failed, using stale value");
                        Ok(range_stat(high.value, low.value))
                    }
                    _ => Err(self.fail(format!("{} {}", symbol, query), e, now).await),
                }
            }
        }
    }

    /// USD → local currency rate. Optional: None when neither fresh nor stale
    /// data is available.
    async fn resolve_fx_rate(&self, now: DateTime<Utc>) -> Option<f64> {
        let currency = self.config.local_currency.as_str();
        if currency.is_empty() {
            return None;
        }

        let store = self.store.as_ref();
        let refresh = self.config.fx_refresh();
        if let Some(rate) = fresh_value(store, StateKey::FxRate, currency, refresh, now).await {
            return Some(rate);
        }

        match self.fetcher.rate(self.rates.as_ref(), currency).await {
            Ok(rate) => {
                let cached = CachedValue::new(rate, now).with_symbol(currency);
                if let Err(e) = store.set(StateKey::FxRate, cached).await {
                    warn!(error = %e, "Failed to cache exchange rate");
                }
                Some(rate)
            }
            Err(e) => {
                let stale = value_for(store, StateKey::FxRate, currency)
                    .await
                    .map(|cached| cached.value);
                match stale {
                    Some(rate) => warn!(error = %e, rate, "Exchange rate refresh failed, using stale value"),
                    None => warn!(error = %e, "Exchange rate unavailable, omitting local price"),
                }
                stale
            }
        }
    }

    /// Quotes for the configured reference instruments that could be fetched.
    async fn fetch_references(&self) -> Vec<InstrumentQuote> {
        let configured = [
            (&self.config.gold_symbol, Instrument::Gold),
            (&self.config.silver_symbol, Instrument::Silver),
            (&self.config.index_symbol, Instrument::EquityIndex),
        ];
        let query = SeriesQuery::intraday();

        let mut quotes = Vec::new();
        for (symbol, kind) in configured {
            let Some(symbol) = symbol.as_deref() else {
                continue;
            };
            match self
                .fetcher
                .quote(symbol, kind, &query, PrevCloseStrategy::ProviderPreviousClose)
                .await
            {
                Ok(quote) => quotes.push(quote),
                Err(e) => warn!(symbol, kind = %kind, error = %e, "Reference quote unavailable, omitting"),
            }
        }
        quotes
    }

    /// Send a message, logging instead of failing. Returns whether it was delivered.
    async fn deliver(&self, what: &str, text: &str) -> bool {
        match self.notifier.send(text).await {
            Ok(()) => {
                info!("Sent {}", what);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to send {}", what);
                false
            }
        }
    }

    /// Notify about an unavailable required source and build the run error.
    async fn fail(&self, what: String, cause: FeedError, now: DateTime<Utc>) -> RunError {
        error!(what = %what, error = %cause, "Required data unavailable");
        let notice = failure_notice(&what, &cause.to_string(), &self.host, now);
        self.deliver("failure notice", &notice).await;
        RunError::Unavailable { what, cause }
    }
}

fn range_stat(high: f64, low: f64) -> RangeStat {
    RangeStat {
        high_over_window: high,
        low_over_window: low,
        window: RANGE_WINDOW,
    }
}
