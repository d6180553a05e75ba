//! USD exchange rate sources.
//!
//! The same logical value (USD → local currency) can come from the market data
//! provider via a synthetic FX symbol or from a dedicated exchange rate API.

use crate::error::{FeedError, FeedResult};
use crate::provider::{MarketDataProvider, SeriesQuery};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Source of a USD conversion rate.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Units of `currency` per 1 USD.
    async fn usd_rate(&self, currency: &str) -> FeedResult<f64>;
}

fn usable_rate(currency: &str, rate: f64) -> FeedResult<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(FeedError::Parse(format!("invalid {} rate: {}", currency, rate)))
    }
}

/// Rate taken from the last close of the `<CCY>=X` series.
pub struct MarketDataRate<P> {
    provider: Arc<P>,
    query: SeriesQuery,
}

impl<P: MarketDataProvider> MarketDataRate<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            query: SeriesQuery::new("1d", "1m"),
        }
    }

    /// Provider symbol for a USD pair, e.g. "THB" → "THB=X".
    pub fn symbol_for(currency: &str) -> String {
        format!("{}=X", currency.to_uppercase())
    }
}

#[async_trait]
impl<P: MarketDataProvider> ExchangeRateProvider for MarketDataRate<P> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn usd_rate(&self, currency: &str) -> FeedResult<f64> {
        let symbol = Self::symbol_for(currency);
        let series = self.provider.series(&symbol, &self.query).await?;
        let close = series
            .latest()
            .map(|p| p.close)
            .ok_or_else(|| FeedError::EmptySeries(symbol.clone()))?;
        usable_rate(currency, close)
    }
}

/// Extract `rates.<CODE>` from an open.er-api.com response.
pub fn parse_er_api(body: &str, currency: &str) -> FeedResult<f64> {
    let json: serde_json::Value = serde_json::from_str(body)?;

    if json["result"].as_str() == Some("error") {
        let kind = json["error-type"].as_str().unwrap_or("unknown");
        return Err(FeedError::InvalidConfig(format!("exchange rate API error: {}", kind)));
    }

    let code = currency.to_uppercase();
    let rate = json["rates"][code.as_str()]
        .as_f64()
        .ok_or_else(|| FeedError::UnknownSymbol(format!("{} rate not found in response", code)))?;
    usable_rate(&code, rate)
}

/// open.er-api.com REST client.
pub struct OpenErApiClient {
    http: reqwest::Client,
    url: String,
}

impl OpenErApiClient {
    pub const URL: &'static str = "https://open.er-api.com/v6/latest/USD";

    pub fn new(request_timeout: Duration) -> FeedResult<Self> {
        Self::with_url(Self::URL, request_timeout)
    }

    pub fn with_url(url: &str, request_timeout: Duration) -> FeedResult<Self> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ExchangeRateProvider for OpenErApiClient {
    fn name(&self) -> &str {
        "open.er-api"
    }

    async fn usd_rate(&self, currency: &str) -> FeedResult<f64> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let rate = parse_er_api(&body, currency)?;
        debug!(currency, rate, "Exchange rate fetched");
        Ok(rate)
    }
}
