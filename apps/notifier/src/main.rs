//! BTC price notifier
//!
//! Fetches the BTC-USD price and reference markets, posts a status report to
//! Telegram and raises a volatility alert on large moves. One invocation is
//! one run; scheduling is left to cron or a systemd timer.

mod config;
mod run;
mod state;

use clap::Parser;
use config::{AppConfig, ConfigError, FxSource};
use run::Runner;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use btc_notify_alerts::{DryRunNotifier, Notifier, TelegramNotifier};
use btc_notify_feeds::{ExchangeRateProvider, MarketDataRate, OpenErApiClient, YahooChartClient};

/// BTC notifier CLI
#[derive(Parser, Debug)]
#[command(name = "btc-notify")]
#[command(about = "BTC price report and volatility alerts over Telegram", long_about = None)]
struct Args {
    /// Telegram chat id (overrides CHAT_ID_BTC)
    #[arg(long, allow_hyphen_values = true)]
    chat_id: Option<String>,

    /// Volatility threshold in percent (overrides VOL_THRESHOLD)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Total retry budget per fetch in seconds
    #[arg(long)]
    retry_timeout: Option<u64>,

    /// Wait between fetch attempts in seconds
    #[arg(long)]
    retry_wait: Option<u64>,

    /// Exchange rate source: market, api
    #[arg(long)]
    fx_source: Option<String>,

    /// State file (.json) or database (.db, .sqlite)
    #[arg(short, long)]
    state_path: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log messages instead of sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(chat_id) = &self.chat_id {
            config.chat_id = Some(chat_id.clone());
        }
        if let Some(threshold) = self.threshold {
            config.threshold_pct = threshold;
        }
        if let Some(secs) = self.retry_timeout {
            config.retry_timeout_secs = secs;
        }
        if let Some(secs) = self.retry_wait {
            config.retry_wait_secs = secs;
        }
        if let Some(source) = &self.fx_source {
            config.fx_source = FxSource::from_str(source).ok_or(ConfigError::Invalid {
                name: "--fx-source",
                value: source.clone(),
            })?;
        }
        if let Some(path) = &self.state_path {
            config.state_path = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.dry_run |= self.dry_run;
        Ok(())
    }
}

/// Filter directive for the subscriber. RUST_LOG wins unless the level was
/// given on the command line; otherwise the configured level applies.
fn log_directive(level: &str, from_cli: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directive) if !from_cli && !directive.trim().is_empty() => directive,
        _ => level.to_string(),
    }
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::new(directive);

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::from_env()?;
    args.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let loaded = load_config(&args);

    let level = match &loaded {
        Ok(config) => config.log_level.clone(),
        Err(_) => args.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    init_logging(&log_directive(
        &level,
        args.log_level.is_some(),
        std::env::var("RUST_LOG").ok(),
    ));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 BTC notifier starting");
    info!("   Symbol: {}", config.btc_symbol);
    info!("   Threshold: {}%", config.threshold_pct);
    info!(
        "   Retry: {}s budget, {}s wait",
        config.retry_timeout_secs, config.retry_wait_secs
    );
    info!("   State: {}", config.state_path.display());
    if config.dry_run {
        info!("   Dry run: messages are logged, not sent");
    }

    let provider = match YahooChartClient::new(config.http_timeout()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build market data client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rates: Arc<dyn ExchangeRateProvider> = match config.fx_source {
        FxSource::Market => Arc::new(MarketDataRate::new(provider.clone())),
        FxSource::Api => match OpenErApiClient::new(config.http_timeout()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!("Failed to build exchange rate client: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let notifier: Arc<dyn Notifier> = match (&config.telegram_token, &config.chat_id, config.dry_run) {
        (Some(token), Some(chat_id), false) => Arc::new(TelegramNotifier::new(
            token.as_str(),
            chat_id.as_str(),
            config.http_timeout(),
        )),
        _ => Arc::new(DryRunNotifier),
    };

    let store = state::open_store(&config.state_path).await;

    let runner = Runner::new(config, provider, rates, notifier, store);
    match runner.run(chrono::Utc::now()).await {
        Ok(summary) => {
            info!(
                price = summary.price,
                change_pct = summary.change_pct,
                status_sent = summary.status_sent,
                alert_sent = summary.alert_sent,
                "Run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
