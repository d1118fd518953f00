// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
//   macd_line[i]   = EMA12[i] - EMA26[i]        (absent unless both present)
//   signal_line    = EMA9 over the present MACD values only, written back onto
//                    the original index space
//
// Running EMA9 straight over a gappy array would fold the leading gaps into
// the seed, so the signal line is computed on the compacted run and
// re-aligned instead.
// =============================================================================

use serde::Serialize;

use super::ema::{calculate_ema, calculate_ema_skipping_gaps};

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// MACD and signal line, both aligned with the input closes.
#[derive(Debug, Clone, Serialize)]
pub struct MacdSeries {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
}

/// Compute MACD(12, 26, 9) over `closes`.
///
/// Both output series have `closes.len()` entries. Short inputs produce
/// all-absent series rather than an error.
pub fn calculate_macd(closes: &[f64]) -> MacdSeries {
    let ema_fast = calculate_ema(closes, MACD_FAST);
    let ema_slow = calculate_ema(closes, MACD_SLOW);

    let macd_line: Vec<Option<f64>> = (0..closes.len())
        .map(|i| {
            let fast = ema_fast.get(i).copied().flatten()?;
            let slow = ema_slow.get(i).copied().flatten()?;
            Some(fast - slow)
        })
        .collect();

    let signal_line = calculate_ema_skipping_gaps(&macd_line, MACD_SIGNAL);

    MacdSeries {
        macd_line,
        signal_line,
    }
}
