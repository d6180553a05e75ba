//! Instrument roles tracked by the notifier.

use serde::{Deserialize, Serialize};

/// Role of a tracked market series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    /// The primary asset (BTC-USD)
    Bitcoin,
    /// Gold future
    Gold,
    /// Silver future
    Silver,
    /// Equity index
    EquityIndex,
}

impl Instrument {
    /// Get identifier used in logs and state keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Instrument::Bitcoin => "btc",
            Instrument::Gold => "gold",
            Instrument::Silver => "silver",
            Instrument::EquityIndex => "equity_index",
        }
    }

    /// Human readable label for messages.
    pub fn label(self) -> &'static str {
        match self {
            Instrument::Bitcoin => "Bitcoin",
            Instrument::Gold => "Gold",
            Instrument::Silver => "Silver",
            Instrument::EquityIndex => "Index",
        }
    }

    /// Message glyph for the instrument section.
    pub fn glyph(self) -> &'static str {
        match self {
            Instrument::Bitcoin => "🔔",
            Instrument::Gold => "🥇",
            Instrument::Silver => "🥈",
            Instrument::EquityIndex => "🏛",
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
