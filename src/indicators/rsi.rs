// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing for every later delta:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// A zero final average loss saturates at 100 (this includes a flat market).
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Default RSI look-back.
pub const RSI_PERIOD: usize = 14;

const OVERBOUGHT: f64 = 70.0;
const OVERSOLD: f64 = 30.0;

/// Compute the most recent RSI value of `prices` over `period`.
///
/// Returns `None` when `prices.len() <= period` (fewer than `period` deltas)
/// or when `period == 0`.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() <= period {
        return None;
    }

    let period_f = period as f64;

    let (sum_gain, sum_loss) = prices[..=period]
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d >= 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    for w in prices[period..].windows(2) {
        let delta = w[1] - w[0];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Badge classification of an RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn classify(rsi: f64) -> Self {
        if rsi > OVERBOUGHT {
            Self::Overbought
        } else if rsi < OVERSOLD {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for RsiZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overbought => write!(f, "OVERBOUGHT"),
            Self::Oversold => write!(f, "OVERSOLD"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], RSI_PERIOD).is_none());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_none());
    }

    #[test]
    fn rsi_absent_when_length_not_above_period() {
        for period in 1..20 {
            let prices: Vec<f64> = (0..=period).map(|x| x as f64).collect();
            // Exactly `period` prices has only `period - 1` deltas.
            assert!(calculate_rsi(&prices[..period], period).is_none());
            assert!(calculate_rsi(&prices[..period / 2], period).is_none());
            // `period + 1` prices is the first length that yields a value.
            assert!(calculate_rsi(&prices, period).is_some());
        }
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&prices, RSI_PERIOD), Some(100.0));
    }

    #[test]
    fn rsi_non_negative_deltas_is_exactly_100() {
        let prices = vec![
            10.0, 10.0, 11.0, 11.0, 12.5, 12.5, 13.0, 13.0, 13.0, 14.0, 15.0, 15.0, 16.0,
            16.0, 16.0, 17.0, 17.5,
        ];
        assert_eq!(calculate_rsi(&prices, RSI_PERIOD), Some(100.0));
    }

    #[test]
    fn rsi_flat_market_saturates() {
        let prices = vec![100.0; 30];
        assert_eq!(calculate_rsi(&prices, RSI_PERIOD), Some(100.0));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let prices: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = calculate_rsi(&prices, RSI_PERIOD).unwrap();
        assert!(rsi.abs() < 1e-10, "expected 0.0, got {rsi}");
    }

    #[test]
    fn rsi_range_check() {
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        for end in RSI_PERIOD + 1..=prices.len() {
            let v = calculate_rsi(&prices[..end], RSI_PERIOD).unwrap();
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_matches_hand_computed_wilder_smoothing() {
        // period 2: deltas +2, -1 seed; then +3.
        let prices = vec![10.0, 12.0, 11.0, 14.0];
        let (g, l) = (2.0 / 2.0, 1.0 / 2.0);
        let g = (g * 1.0 + 3.0) / 2.0;
        let l = (l * 1.0 + 0.0) / 2.0;
        let expected = 100.0 - 100.0 / (1.0 + g / l);
        let rsi = calculate_rsi(&prices, 2).unwrap();
        assert!((rsi - expected).abs() < 1e-10);
    }

    #[test]
    fn zone_thresholds_are_strict() {
        assert_eq!(RsiZone::classify(70.0), RsiZone::Neutral);
        assert_eq!(RsiZone::classify(70.01), RsiZone::Overbought);
        assert_eq!(RsiZone::classify(30.0), RsiZone::Neutral);
        assert_eq!(RsiZone::classify(29.99), RsiZone::Oversold);
        assert_eq!(RsiZone::Overbought.to_string(), "OVERBOUGHT");
    }
}
