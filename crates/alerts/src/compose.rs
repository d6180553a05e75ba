//! Message composition.
//!
//! Pure functions from fetched values to Telegram Markdown text. Optional
//! sections are left out when their data is missing.

use btc_notify_core::{InstrumentQuote, RangeStat};
use chrono::{DateTime, Utc};

/// BTC price converted into the local currency.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPrice {
    /// ISO code, e.g. "THB"
    pub currency: String,
    /// Units of local currency per USD
    pub rate: f64,
    pub value: f64,
}

impl LocalPrice {
    pub fn convert(usd_price: f64, currency: &str, rate: f64) -> Self {
        Self {
            currency: currency.to_uppercase(),
            rate,
            value: usd_price * rate,
        }
    }
}

/// Everything known at the end of the fetch stage.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub btc: InstrumentQuote,
    pub local_price: Option<LocalPrice>,
    pub range: Option<RangeStat>,
    /// Gold, silver, index quotes that were available
    pub references: Vec<InstrumentQuote>,
    pub as_of: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(btc: InstrumentQuote, as_of: DateTime<Utc>) -> Self {
        Self {
            btc,
            local_price: None,
            range: None,
            references: Vec::new(),
            as_of,
        }
    }
}

/// Format with thousands separators and a fixed number of decimals.
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }

    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
    // Rounded-to-zero values print without a sign.
    if value < 0.0 && formatted.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
        out.push('-');
    }
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Like [`format_number`] with an explicit sign for non-negative values.
pub fn format_signed(value: f64, decimals: usize) -> String {
    let body = format_number(value, decimals);
    if body.starts_with('-') || body == "n/a" {
        body
    } else {
        format!("+{}", body)
    }
}

/// Escape characters that have meaning in Telegram's legacy Markdown.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn range_label(range: &RangeStat) -> String {
    let days = range.window_days();
    if days >= 30 {
        format!("{}-month range", days / 30)
    } else {
        format!("{}-day range", days.max(1))
    }
}

fn timestamp_line(at: DateTime<Utc>) -> String {
    format!("⏰ {}", at.format("%Y-%m-%d %H:%M UTC"))
}

fn high_low_lines(quote: &InstrumentQuote) -> String {
    format!(
        "📈 High (24h): {}\n📉 Low (24h): {}\n",
        format_number(quote.day_high, 2),
        format_number(quote.day_low, 2)
    )
}

fn reference_line(quote: &InstrumentQuote) -> String {
    format!(
        "{} {} ({}): {} {} {} ({}%)",
        quote.kind.glyph(),
        quote.kind.label(),
        escape_markdown(&quote.symbol),
        format_number(quote.price, 2),
        quote.direction().glyph(),
        format_signed(quote.change, 2),
        format_signed(quote.change_pct, 2)
    )
}

/// Periodic status report.
pub fn status_report(snapshot: &MarketSnapshot) -> String {
    let btc = &snapshot.btc;
    let mut msg = format!(
        "{} *{} ({})*\n\n💵 Price: *{}*\n{} 24h change: {} ({}%)\n",
        btc.kind.glyph(),
        btc.kind.label(),
        escape_markdown(&btc.symbol),
        format_number(btc.price, 2),
        btc.direction().glyph(),
        format_signed(btc.change, 2),
        format_signed(btc.change_pct, 2)
    );

    if let Some(local) = &snapshot.local_price {
        msg.push_str(&format!("({} {})\n", format_number(local.value, 0), local.currency));
    }

    msg.push('\n');
    msg.push_str(&high_low_lines(btc));

    if let Some(range) = &snapshot.range {
        msg.push_str(&format!(
            "\n📊 {}:\n{} - {}\n",
            range_label(range),
            format_number(range.high_over_window, 2),
            format_number(range.low_over_window, 2)
        ));
    }

    let has_fx = snapshot.local_price.is_some();
    if !snapshot.references.is_empty() || has_fx {
        msg.push('\n');
        for quote in &snapshot.references {
            msg.push_str(&reference_line(quote));
            msg.push('\n');
        }
        if let Some(local) = &snapshot.local_price {
            msg.push_str(&format!(
                "💱 USD/{}: {}\n",
                local.currency,
                format_number(local.rate, 2)
            ));
        }
    }

    msg.push('\n');
    msg.push_str(&timestamp_line(snapshot.as_of));
    msg
}

/// Volatility alert sent in addition to the status report.
pub fn volatility_alert(snapshot: &MarketSnapshot, threshold_pct: f64) -> String {
    let btc = &snapshot.btc;
    let mut msg = format!(
        "⚡ *Volatility Alert: {}*\n\n{} Price moved {}% or more in 24h\nPrice: {} ({}%)\n\n",
        escape_markdown(&btc.symbol),
        btc.direction().glyph(),
        threshold_pct,
        format_number(btc.price, 2),
        format_signed(btc.change_pct, 2)
    );
    msg.push_str(&high_low_lines(btc));

    if let Some(range) = &snapshot.range {
        msg.push_str(&format!(
            "📊 {}: {} - {}\n",
            range_label(range),
            format_number(range.high_over_window, 2),
            format_number(range.low_over_window, 2)
        ));
    }

    msg.push('\n');
    msg.push_str(&timestamp_line(snapshot.as_of));
    msg
}

/// Notice sent when a required data source is unavailable.
pub fn failure_notice(source: &str, detail: &str, host: &str, at: DateTime<Utc>) -> String {
    format!(
        "❌ *Price report failed*\n\nSource: {}\nError: {}\nHost: {}\n\n{}",
        escape_markdown(source),
        escape_markdown(detail),
        escape_markdown(host),
        timestamp_line(at)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use btc_notify_core::Instrument;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
    }

    fn btc(price: f64, prev_close: f64) -> InstrumentQuote {
        InstrumentQuote::from_prev_close(
            "BTC-USD",
            Instrument::Bitcoin,
            price,
            prev_close,
            62_900.0,
            64_500.0,
        )
    }

    fn gold() -> InstrumentQuote {
        InstrumentQuote::from_prev_close("GC=F", Instrument::Gold, 2345.6, 2333.3, 2330.0, 2350.0)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(64_210.5, 2), "64,210.50");
        assert_eq!(format_number(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(format_number(999.999, 2), "1,000.00");
        assert_eq!(format_number(2_338_555.4, 0), "2,338,555");
        assert_eq!(format_number(12.0, 2), "12.00");
        assert_eq!(format_number(-1_210.5, 2), "-1,210.50");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(f64::NAN, 2), "n/a");
    }

    #[test]
    fn test_format_signed() {
        assert_eq!(format_signed(1_210.5, 2), "+1,210.50");
        assert_eq!(format_signed(-3.4211, 2), "-3.42");
        assert_eq!(format_signed(0.0, 2), "+0.00");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("my_host*1"), "my\\_host\\*1");
        assert_eq!(escape_markdown("^GSPC"), "^GSPC");
    }

    #[test]
    fn test_status_report_full() {
        let mut snapshot = MarketSnapshot::new(btc(64_210.5, 63_000.0), as_of());
        snapshot.local_price = Some(LocalPrice::convert(64_210.5, "thb", 36.42));
        snapshot.range = Some(RangeStat {
            high_over_window: 73_000.0,
            low_over_window: 52_000.0,
            window: Duration::from_secs(90 * 86_400),
        });
        snapshot.references.push(gold());

        let msg = status_report(&snapshot);

        assert!(msg.starts_with("🔔 *Bitcoin (BTC-USD)*"));
        assert!(msg.contains("💵 Price: *64,210.50*"));
        assert!(msg.contains("🟢 24h change: +1,210.50 (+1.92%)"));
        assert!(msg.contains("(2,338,546 THB)"));
        assert!(msg.contains("📈 High (24h): 64,500.00"));
        assert!(msg.contains("📉 Low (24h): 62,900.00"));
        assert!(msg.contains("📊 3-month range:\n73,000.00 - 52,000.00"));
        assert!(msg.contains("🥇 Gold (GC=F): 2,345.60 🟢 +12.30 (+0.53%)"));
        assert!(msg.contains("💱 USD/THB: 36.42"));
        assert!(msg.ends_with("⏰ 2025-05-01 08:00 UTC"));
    }

    #[test]
    fn test_status_report_partial() {
        let snapshot = MarketSnapshot::new(btc(64_210.5, 63_000.0), as_of());
        let msg = status_report(&snapshot);

        assert!(msg.contains("💵 Price: *64,210.50*"));
        assert!(msg.contains("📈 High (24h)"));
        assert!(!msg.contains("THB"));
        assert!(!msg.contains("range"));
        assert!(!msg.contains("Gold"));
        assert!(!msg.contains("Silver"));
        assert!(!msg.contains("Index"));
        assert!(!msg.contains("💱"));
    }

    #[test]
    fn test_status_report_direction_glyphs() {
        let down = status_report(&MarketSnapshot::new(btc(62_000.0, 63_000.0), as_of()));
        assert!(down.contains("🔴 24h change: -1,000.00 (-1.59%)"));

        let flat = status_report(&MarketSnapshot::new(btc(63_000.0, 63_000.0), as_of()));
        assert!(flat.contains("⚪ 24h change: +0.00 (+0.00%)"));
    }

    #[test]
    fn test_volatility_alert() {
        let mut snapshot = MarketSnapshot::new(btc(65_000.0, 63_000.0), as_of());
        snapshot.range = Some(RangeStat {
            high_over_window: 73_000.0,
            low_over_window: 52_000.0,
            window: Duration::from_secs(90 * 86_400),
        });

        let msg = volatility_alert(&snapshot, 3.0);

        assert!(msg.starts_with("⚡ *Volatility Alert: BTC-USD*"));
        assert!(msg.contains("moved 3% or more in 24h"));
        assert!(msg.contains("Price: 65,000.00 (+3.17%)"));
        assert!(msg.contains("📊 3-month range: 73,000.00 - 52,000.00"));
    }

    #[test]
    fn test_volatility_alert_without_range() {
        let snapshot = MarketSnapshot::new(btc(65_000.0, 63_000.0), as_of());
        let msg = volatility_alert(&snapshot, 1.5);
        assert!(msg.contains("moved 1.5% or more"));
        assert!(!msg.contains("📊"));
    }

    #[test]
    fn test_failure_notice() {
        let msg = failure_notice("BTC-USD 1d/1h", "Empty series for BTC-USD", "cron_box", as_of());
        assert!(msg.starts_with("❌"));
        assert!(msg.contains("Source: BTC-USD 1d/1h"));
        assert!(msg.contains("Host: cron\\_box"));
        assert_eq!(msg.lines().last(), Some("⏰ 2025-05-01 08:00 UTC"));
    }
}
