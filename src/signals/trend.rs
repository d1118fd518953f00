// =============================================================================
// Trend Classification — price vs EMA21 vs EMA50
// =============================================================================
//
//   BULLISH   last_price > ema21 > ema50   (both strict)
//   BEARISH   last_price < ema21 < ema50   (both strict)
//   SIDEWAYS  anything else, including a trending price over unordered EMAs
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendSignal {
    Bullish,
    Bearish,
    Sideways,
    NoData,
}

impl std::fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Sideways => write!(f, "SIDEWAYS"),
            Self::NoData => write!(f, "NO_DATA"),
        }
    }
}

/// Classify the EMA stack relative to the last price.
pub fn calculate_trend(last_price: f64, ema21: f64, ema50: f64) -> TrendSignal {
    if ![last_price, ema21, ema50].iter().all(|v| v.is_finite()) {
        return TrendSignal::NoData;
    }

    if last_price > ema21 && ema21 > ema50 {
        TrendSignal::Bullish
    } else if last_price < ema21 && ema21 < ema50 {
        TrendSignal::Bearish
    } else {
        TrendSignal::Sideways
    }
}
