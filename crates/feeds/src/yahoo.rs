//! Yahoo Finance chart API client.
//!
//! Fetches bar series via `GET /v8/finance/chart/{symbol}?range=..&interval=..`.

use crate::error::{FeedError, FeedResult};
use crate::provider::{MarketDataProvider, PriceSeries, SeriesQuery};
use async_trait::async_trait;
use btc_notify_core::PricePoint;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteArrays>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteArrays {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
}

/// Parse a chart response body into a series.
///
/// Bars without a close are dropped. A missing high or low falls back to the close.
pub fn parse_chart(symbol: &str, body: &str) -> FeedResult<PriceSeries> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        let detail = err.description.unwrap_or(err.code);
        return Err(FeedError::UnknownSymbol(format!("{}: {}", symbol, detail)));
    }

    let result = match envelope.chart.result.and_then(|r| r.into_iter().next()) {
        Some(r) => r,
        None => return Ok(PriceSeries::default()),
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let mut points = Vec::with_capacity(result.timestamp.len());

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let close = match quote.close.get(i).copied().flatten() {
            Some(c) if c.is_finite() => c,
            _ => continue,
        };
        let high = quote.high.get(i).copied().flatten().unwrap_or(close);
        let low = quote.low.get(i).copied().flatten().unwrap_or(close);
        let timestamp = match DateTime::<Utc>::from_timestamp(ts, 0) {
            Some(t) => t,
            None => continue,
        };
        points.push(PricePoint::new(timestamp, close, high, low));
    }

    Ok(PriceSeries {
        points,
        previous_close: result
            .meta
            .chart_previous_close
            .or(result.meta.previous_close),
    })
}

/// Yahoo Finance chart client.
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub const BASE_URL: &'static str = "https://query1.finance.yahoo.com";

    /// Create a client with a per-request timeout.
    pub fn new(request_timeout: Duration) -> FeedResult<Self> {
        Self::with_base_url(Self::BASE_URL, request_timeout)
    }

    pub fn with_base_url(base_url: &str, request_timeout: Duration) -> FeedResult<Self> {
        // The chart endpoint rejects requests without a browser-like agent.
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) btc-notify")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, symbol)
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartClient {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn series(&self, symbol: &str, query: &SeriesQuery) -> FeedResult<PriceSeries> {
        if symbol.trim().is_empty() {
            return Err(FeedError::InvalidConfig("empty symbol".to_string()));
        }

        let response = self
            .http
            .get(self.chart_url(symbol))
            .query(&[
                ("range", query.range.as_str()),
                ("interval", query.interval.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 404 {
            // Unknown symbols come back as 404, usually with a chart.error payload.
            return Err(match parse_chart(symbol, &body) {
                Err(FeedError::UnknownSymbol(detail)) => FeedError::UnknownSymbol(detail),
                _ => FeedError::UnknownSymbol(symbol.to_string()),
            });
        }
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let series = parse_chart(symbol, &body)?;
        debug!(
            symbol,
            query = %query,
            bars = series.points.len(),
            "Yahoo chart fetched"
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::serve_once;
    use pretty_assertions::assert_eq;

    const BTC_HOURLY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "BTC-USD",
                    "regularMarketPrice": 64210.5,
                    "chartPreviousClose": 63000.0
                },
                "timestamp": [1735689600, 1735693200, 1735696800],
                "indicators": {
                    "quote": [{
                        "open": [63100.0, 63900.0, 64000.0],
                        "close": [63950.0, null, 64210.5],
                        "high": [64000.0, 64100.0, null],
                        "low": [63050.0, 63800.0, 63990.0],
                        "volume": [0, 0, 0]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_drops_null_closes() {
        let series = parse_chart("BTC-USD", BTC_HOURLY).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].close, 63950.0);
        assert_eq!(series.points[1].close, 64210.5);
        assert_eq!(series.previous_close, Some(63000.0));
    }

    #[test]
    fn test_parse_chart_missing_high_falls_back_to_close() {
        let series = parse_chart("BTC-USD", BTC_HOURLY).unwrap();
        let last = series.latest().unwrap();
        assert_eq!(last.high, 64210.5);
        assert_eq!(last.low, 63990.0);
        assert_eq!(last.timestamp.timestamp(), 1735696800);
    }

    #[test]
    fn test_parse_chart_error_is_unknown_symbol() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("NOPE", body).unwrap_err();
        assert!(matches!(err, FeedError::UnknownSymbol(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_chart_without_bars_is_empty() {
        let body = r#"{"chart":{"result":[{"meta":{"previousClose":35.1},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let series = parse_chart("THB=X", body).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.previous_close, Some(35.1));
    }

    #[test]
    fn test_parse_chart_malformed() {
        let err = parse_chart("BTC-USD", "<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_chart_url() {
        let client =
            YahooChartClient::with_base_url("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.chart_url("BTC-USD"),
            "http://localhost:9/v8/finance/chart/BTC-USD"
        );
    }

    fn client(base: &str) -> YahooChartClient {
        YahooChartClient::with_base_url(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_series_over_http() {
        let base = serve_once("200 OK", BTC_HOURLY).await;
        let series = client(&base)
            .series("BTC-USD", &SeriesQuery::intraday())
            .await
            .unwrap();
        assert_eq!(series.points.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_unknown_symbol() {
        let base = serve_once(
            "404 Not Found",
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .await;
        let err = client(&base)
            .series("NOPE", &SeriesQuery::intraday())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UnknownSymbol(ref d) if d.contains("delisted")));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found_with_html_body_is_unknown_symbol() {
        let base = serve_once("404 Not Found", "<html>Not Found</html>").await;
        let err = client(&base)
            .series("NOPE", &SeriesQuery::intraday())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UnknownSymbol(ref s) if s == "NOPE"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient_status() {
        let base = serve_once("503 Service Unavailable", r#"{"finance":{"error":"busy"}}"#).await;
        let err = client(&base)
            .series("BTC-USD", &SeriesQuery::intraday())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient_status() {
        let base = serve_once("429 Too Many Requests", "Too Many Requests").await;
        let err = client(&base)
            .series("BTC-USD", &SeriesQuery::intraday())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 429, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_forbidden_is_permanent_status() {
        let base = serve_once("403 Forbidden", "denied").await;
        let err = client(&base)
            .series("BTC-USD", &SeriesQuery::intraday())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 403, .. }));
        assert!(!err.is_transient());
    }
}
