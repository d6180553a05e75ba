//! Application configuration.

use btc_notify_engine::VolatilityConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Where the USD → local currency rate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FxSource {
    /// `<CCY>=X` series from the market data provider.
    #[default]
    Market,
    /// open.er-api.com
    Api,
}

impl FxSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "market" | "yahoo" => Some(FxSource::Market),
            "api" | "er-api" => Some(FxSource::Api),
            _ => None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
    pub btc_symbol: String,
    /// Volatility threshold in percent.
    pub threshold_pct: f64,
    pub retry_timeout_secs: u64,
    pub retry_wait_secs: u64,
    pub http_timeout_secs: u64,
    pub range_refresh_secs: u64,
    pub fx_refresh_secs: u64,
    pub fx_source: FxSource,
    /// Empty disables the local currency conversion.
    pub local_currency: String,
    pub gold_symbol: Option<String>,
    pub silver_symbol: Option<String>,
    pub index_symbol: Option<String>,
    pub state_path: PathBuf,
    pub log_level: String,
    /// Log messages instead of sending them.
    pub dry_run: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            chat_id: None,
            btc_symbol: "BTC-USD".to_string(),
            threshold_pct: VolatilityConfig::default().threshold_pct,
            retry_timeout_secs: 180,
            retry_wait_secs: 5,
            http_timeout_secs: 10,
            range_refresh_secs: 24 * 60 * 60,
            fx_refresh_secs: 5 * 60,
            fx_source: FxSource::Market,
            local_currency: "THB".to_string(),
            gold_symbol: Some("GC=F".to_string()),
            silver_symbol: Some("SI=F".to_string()),
            index_symbol: Some("^GSPC".to_string()),
            state_path: PathBuf::from("btc_notify_state.json"),
            log_level: "info".to_string(),
            dry_run: false,
        }
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

/// Empty string means "disabled".
fn optional_symbol(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl AppConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("TELEGRAM_TOKEN") {
            config.telegram_token = optional_symbol(v);
        }
        if let Some(v) = lookup("CHAT_ID_BTC") {
            config.chat_id = optional_symbol(v);
        }
        if let Some(v) = lookup("BTC_SYMBOL").and_then(optional_symbol) {
            config.btc_symbol = v;
        }
        if let Some(v) = lookup("VOL_THRESHOLD") {
            config.threshold_pct = parse_num("VOL_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("RETRY_TIMEOUT_SECS") {
            config.retry_timeout_secs = parse_num("RETRY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RETRY_WAIT_SECS") {
            config.retry_wait_secs = parse_num("RETRY_WAIT_SECS", &v)?;
        }
        if let Some(v) = lookup("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_num("HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RANGE_REFRESH_SECS") {
            config.range_refresh_secs = parse_num("RANGE_REFRESH_SECS", &v)?;
        }
        if let Some(v) = lookup("FX_REFRESH_SECS") {
            config.fx_refresh_secs = parse_num("FX_REFRESH_SECS", &v)?;
        }
        if let Some(v) = lookup("FX_SOURCE") {
            config.fx_source = FxSource::from_str(&v).ok_or(ConfigError::Invalid {
                name: "FX_SOURCE",
                value: v,
            })?;
        }
        if let Some(v) = lookup("LOCAL_CURRENCY") {
            config.local_currency = v.trim().to_uppercase();
        }
        if let Some(v) = lookup("GOLD_SYMBOL") {
            config.gold_symbol = optional_symbol(v);
        }
        if let Some(v) = lookup("SILVER_SYMBOL") {
            config.silver_symbol = optional_symbol(v);
        }
        if let Some(v) = lookup("INDEX_SYMBOL") {
            config.index_symbol = optional_symbol(v);
        }
        if let Some(v) = lookup("STATE_PATH").and_then(optional_symbol) {
            config.state_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LOG_LEVEL").and_then(optional_symbol) {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Reject configurations a run cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dry_run {
            if self.telegram_token.is_none() {
                return Err(ConfigError::Missing("TELEGRAM_TOKEN"));
            }
            if self.chat_id.is_none() {
                return Err(ConfigError::Missing("CHAT_ID_BTC"));
            }
        }
        if !self.threshold_pct.is_finite() || self.threshold_pct <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "VOL_THRESHOLD",
                value: self.threshold_pct.to_string(),
            });
        }
        if self.retry_wait_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "RETRY_WAIT_SECS",
                value: "0".to_string(),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn volatility(&self) -> VolatilityConfig {
        VolatilityConfig {
            threshold_pct: self.threshold_pct,
        }
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_secs)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn range_refresh(&self) -> Duration {
        Duration::from_secs(self.range_refresh_secs)
    }

    pub fn fx_refresh(&self) -> Duration {
        Duration::from_secs(self.fx_refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.threshold_pct, 3.0);
        assert_eq!(config.retry_timeout(), Duration::from_secs(180));
        assert_eq!(config.retry_wait(), Duration::from_secs(5));
        assert_eq!(config.range_refresh(), Duration::from_secs(86_400));
        assert_eq!(config.fx_refresh(), Duration::from_secs(300));
        assert_eq!(config.fx_source, FxSource::Market);
        assert_eq!(config.state_path, PathBuf::from("btc_notify_state.json"));
        assert_eq!(config.gold_symbol.as_deref(), Some("GC=F"));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TELEGRAM_TOKEN", "123:abc"),
            ("CHAT_ID_BTC", "-1001"),
            ("VOL_THRESHOLD", "1.5"),
            ("RETRY_TIMEOUT_SECS", "60"),
            ("FX_SOURCE", "api"),
            ("LOCAL_CURRENCY", "eur"),
            ("STATE_PATH", "/var/lib/btc/state.db"),
        ]))
        .unwrap();

        assert_eq!(config.telegram_token.as_deref(), Some("123:abc"));
        assert_eq!(config.chat_id.as_deref(), Some("-1001"));
        assert_eq!(config.threshold_pct, 1.5);
        assert_eq!(config.retry_timeout_secs, 60);
        assert_eq!(config.fx_source, FxSource::Api);
        assert_eq!(config.local_currency, "EUR");
        assert_eq!(config.state_path, PathBuf::from("/var/lib/btc/state.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_symbol_disables_reference() {
        let config = AppConfig::from_lookup(lookup(&[("GOLD_SYMBOL", ""), ("INDEX_SYMBOL", "  ")]))
            .unwrap();
        assert_eq!(config.gold_symbol, None);
        assert_eq!(config.index_symbol, None);
        assert_eq!(config.silver_symbol.as_deref(), Some("SI=F"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("VOL_THRESHOLD", "three")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "VOL_THRESHOLD",
                value: "three".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_fx_source_is_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("FX_SOURCE", "bank")])).is_err());
        assert_eq!(FxSource::from_str(" Market "), Some(FxSource::Market));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = AppConfig::default();
        assert_eq!(config.validate(), Err(ConfigError::Missing("TELEGRAM_TOKEN")));

        let config = AppConfig {
            telegram_token: Some("t".to_string()),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Missing("CHAT_ID_BTC")));
    }

    #[test]
    fn test_dry_run_skips_credentials() {
        let config = AppConfig {
            dry_run: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = AppConfig {
            dry_run: true,
            threshold_pct: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "VOL_THRESHOLD", .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.threshold_pct, config.threshold_pct);
        assert_eq!(parsed.state_path, config.state_path);
    }
}
