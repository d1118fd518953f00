// =============================================================================
// Shared types used across the signal board
// =============================================================================

use serde::{Deserialize, Serialize};

/// Quote asset appended to bare base symbols and stripped for display.
pub const QUOTE_ASSET: &str = "USDT";

/// A configured timeframe: the column label shown to users and the exchange
/// kline interval it is fetched with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeframeSpec {
    pub label: String,
    pub interval: String,
}

impl TimeframeSpec {
    pub fn new(label: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: interval.into(),
        }
    }
}

impl std::fmt::Display for TimeframeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.interval)
    }
}

/// The four columns of the board, widest bucket first.
pub fn default_timeframes() -> Vec<TimeframeSpec> {
    vec![
        TimeframeSpec::new("1D", "1d"),
        TimeframeSpec::new("4H", "4h"),
        TimeframeSpec::new("1H", "1h"),
        TimeframeSpec::new("15m", "15m"),
    ]
}

/// `BTCUSDT` → `BTC/USDT`. Symbols without the quote suffix are returned
/// unchanged.
pub fn format_pair(symbol: &str) -> String {
    match symbol.strip_suffix(QUOTE_ASSET) {
        Some(base) => format!("{base}/{QUOTE_ASSET}"),
        None => symbol.to_string(),
    }
}
