//! Volatility alert evaluator.
//!
//! An alert is eligible when the observed change crosses the threshold. The
//! dedup gate then requires the price to have moved by at least the threshold
//! since the last delivered alert, so a sustained move does not alert on every
//! run.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for the volatility evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Alert sensitivity in percent.
    pub threshold_pct: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self { threshold_pct: 3.0 }
    }
}

/// Why an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FireReason {
    /// No alert has been delivered before.
    FirstAlert,
    /// Price moved at least the threshold since the last alert.
    MovedSinceLastAlert { moved_pct: f64 },
    /// Stored last alert price was unusable (zero, negative or NaN); gate left open.
    GuardOpened { stored: f64 },
}

/// Why an alert is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Observed change is below the threshold.
    BelowThreshold,
    /// Eligible, but the price is still within the threshold of the last alert.
    Deduplicated { moved_pct: f64 },
}

/// Evaluator output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlertDecision {
    Fire(FireReason),
    Skip(SkipReason),
}

impl AlertDecision {
    #[inline]
    pub fn should_fire(&self) -> bool {
        matches!(self, AlertDecision::Fire(_))
    }
}

/// Decides whether a volatility alert should be sent.
#[derive(Debug, Clone)]
pub struct VolatilityEvaluator {
    config: VolatilityConfig,
}

impl VolatilityEvaluator {
    pub fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }

    pub fn threshold_pct(&self) -> f64 {
        self.config.threshold_pct
    }

    /// Percentage distance of `price` from `reference`.
    pub fn moved_pct(price: f64, reference: f64) -> f64 {
        (price - reference).abs() / reference * 100.0
    }

    /// Evaluate one observation.
    ///
    /// * `price` - current price
    /// * `change_pct` - signed change over the observation window
    /// * `last_alert_price` - price of the last delivered alert, if any
    pub fn evaluate(
        &self,
        price: f64,
        change_pct: f64,
        last_alert_price: Option<f64>,
    ) -> AlertDecision {
        let threshold = self.config.threshold_pct;

        if change_pct.is_nan() || change_pct.abs() < threshold {
            debug!(change_pct, threshold, "Change below volatility threshold");
            return AlertDecision::Skip(SkipReason::BelowThreshold);
        }

        let last = match last_alert_price {
            None => return AlertDecision::Fire(FireReason::FirstAlert),
            Some(last) => last,
        };

        if !last.is_finite() || last <= 0.0 {
            warn!(
                stored = last,
                "Stored last alert price is unusable, skipping dedup gate"
            );
            return AlertDecision::Fire(FireReason::GuardOpened { stored: last });
        }

        let moved_pct = Self::moved_pct(price, last);
        if moved_pct >= threshold {
            AlertDecision::Fire(FireReason::MovedSinceLastAlert { moved_pct })
        } else {
            debug!(
                price,
                last_alert_price = last,
                moved_pct,
                "Alert suppressed, price still near last alert"
            );
            AlertDecision::Skip(SkipReason::Deduplicated { moved_pct })
        }
    }
}

impl Default for VolatilityEvaluator {
    fn default() -> Self {
        Self::new(VolatilityConfig::default())
    }
}
