// =============================================================================
// Timeframe Evaluation — one symbol, one kline interval
// =============================================================================
//
// Turns a kline payload into a TimeframeSnapshot:
//   1. closes in payload order, non-finite entries dropped
//   2. the final close replaced by the live last-traded price (the newest
//      candle is usually still open)
//   3. RSI(14), EMA(21), EMA(50), MACD(12, 26, 9)
//   4. price vs EMA21, price vs EMA50 and MACD vs signal crossovers on the
//      last two points, plus the price/EMA21/EMA50 trend
//
// The live-price patch is applied on every interval, 1D and 4H included, so a
// wide bucket's "close" is really the current tick.

use serde::Serialize;
use tracing::debug;

use crate::indicators::{calculate_ema, calculate_macd, calculate_rsi, last_value, RsiZone, RSI_PERIOD};
use crate::market_data::{finite_closes, Kline, MarketDataError};
use crate::signals::{calculate_trend, detect_series_cross, CrossSignal, TrendSignal};

pub const EMA_TREND_FAST: usize = 21;
pub const EMA_TREND_SLOW: usize = 50;

/// Raw series kept with a snapshot so the chart can be drawn without
/// recomputing anything. All `Option` series are aligned with `closes`
/// (the EMAs are empty when the window could not be filled).
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSeries {
    pub closes: Vec<f64>,
    pub ema21: Vec<Option<f64>>,
    pub ema50: Vec<Option<f64>>,
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
}

/// Indicator readings for one symbol on one timeframe.
#[derive(Debug, Clone, Serialize)]
pub struct TimeframeSnapshot {
    pub rsi: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
    pub macd_cross: CrossSignal,
    pub price_vs_ema21_cross: CrossSignal,
    pub price_vs_ema50_cross: CrossSignal,
    pub trend: TrendSignal,
    pub series: SnapshotSeries,
}

/// Evaluate one kline payload against the live price.
///
/// Fails when the payload is empty or carries no finite close; never fills
/// in missing data.
pub fn evaluate_timeframe(klines: &[Kline], live_price: f64) -> Result<TimeframeSnapshot, MarketDataError> {
    let mut closes = finite_closes(klines);

    let Some(last) = closes.last_mut() else {
        return Err(MarketDataError::EmptyPayload { endpoint: "klines" });
    };
    if live_price.is_finite() {
        *last = live_price;
    }

    debug!(
        rows = klines.len(),
        closes = closes.len(),
        live_price,
        "timeframe evaluation"
    );

    Ok(analyze_closes(closes))
}

/// Run every indicator and classifier over an already-prepared close series.
pub fn analyze_closes(closes: Vec<f64>) -> TimeframeSnapshot {
    let rsi = calculate_rsi(&closes, RSI_PERIOD);
    let ema21 = calculate_ema(&closes, EMA_TREND_FAST);
    let ema50 = calculate_ema(&closes, EMA_TREND_SLOW);
    let macd = calculate_macd(&closes);

    let price: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();

    let trend = match (closes.last(), last_value(&ema21), last_value(&ema50)) {
        (Some(&p), Some(e21), Some(e50)) => calculate_trend(p, e21, e50),
        _ => TrendSignal::NoData,
    };

    TimeframeSnapshot {
        rsi,
        rsi_zone: rsi.map(RsiZone::classify),
        macd_cross: detect_series_cross(&macd.macd_line, &macd.signal_line),
        price_vs_ema21_cross: detect_series_cross(&price, &ema21),
        price_vs_ema50_cross: detect_series_cross(&price, &ema50),
        trend,
        series: SnapshotSeries {
            closes,
            ema21,
            ema50,
            macd_line: macd.macd_line,
            signal_line: macd.signal_line,
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn klines_from(closes: &[f64]) -> Vec<Kline> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Kline::new(c, i as i64 * 60_000))
            .collect()
    }

    /// 100 falling closes (200 → 101) followed by 200 rising closes (102 → 301).
    fn v_shape() -> Vec<f64> {
        let fall = (0..100).map(|i| 200.0 - i as f64);
        let rise = (0..200).map(|j| 102.0 + j as f64);
        fall.chain(rise).collect()
    }

    #[test]
    fn empty_payload_fails() {
        assert!(matches!(
            evaluate_timeframe(&[], 100.0),
            Err(MarketDataError::EmptyPayload { .. })
        ));
    }

    #[test]
    fn payload_without_finite_close_fails() {
        let rows = vec![
            Kline {
                close: None,
                close_time: Some(1),
            };
            5
        ];
        assert!(evaluate_timeframe(&rows, 100.0).is_err());
    }

    #[test]
    fn live_price_replaces_last_close() {
        let rows = klines_from(&[1.0, 2.0, 3.0]);
        let snap = evaluate_timeframe(&rows, 9.5).unwrap();
        assert_eq!(snap.series.closes, vec![1.0, 2.0, 9.5]);
    }

    #[test]
    fn non_finite_rows_dropped_before_patch() {
        let mut rows = klines_from(&[1.0, 2.0, 3.0]);
        rows.push(Kline {
            close: None,
            close_time: Some(999),
        });
        let snap = evaluate_timeframe(&rows, 7.0).unwrap();
        assert_eq!(snap.series.closes, vec![1.0, 2.0, 7.0]);
    }

    #[test]
    fn non_finite_live_price_keeps_candle_close() {
        let rows = klines_from(&[1.0, 2.0, 3.0]);
        let snap = evaluate_timeframe(&rows, f64::NAN).unwrap();
        assert_eq!(snap.series.closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn short_series_degrades_to_no_data() {
        let snap = analyze_closes(vec![1.0, 2.0, 3.0]);
        assert_eq!(snap.rsi, None);
        assert_eq!(snap.rsi_zone, None);
        assert_eq!(snap.macd_cross, CrossSignal::NoData);
        assert_eq!(snap.price_vs_ema21_cross, CrossSignal::NoData);
        assert_eq!(snap.price_vs_ema50_cross, CrossSignal::NoData);
        assert_eq!(snap.trend, TrendSignal::NoData);
        assert!(snap.series.ema21.is_empty());
    }

    #[test]
    fn series_are_aligned_with_closes() {
        let closes = v_shape();
        let snap = analyze_closes(closes.clone());
        assert_eq!(snap.series.closes.len(), closes.len());
        assert_eq!(snap.series.ema21.len(), closes.len());
        assert_eq!(snap.series.ema50.len(), closes.len());
        assert_eq!(snap.series.macd_line.len(), closes.len());
        assert_eq!(snap.series.signal_line.len(), closes.len());
    }

    #[test]
    fn v_shape_crosses_each_ema_upward_exactly_once() {
        let closes = v_shape();
        let full = analyze_closes(closes.clone());

        for (period, ema) in [(EMA_TREND_FAST, &full.series.ema21), (EMA_TREND_SLOW, &full.series.ema50)] {
            let mut bullish_at = Vec::new();
            for end in 2..=closes.len() {
                let snap = analyze_closes(closes[..end].to_vec());
                let cross = if period == EMA_TREND_FAST {
                    snap.price_vs_ema21_cross
                } else {
                    snap.price_vs_ema50_cross
                };
                assert_ne!(cross, CrossSignal::BearishCross, "EMA{period} bearish at {end}");
                if cross == CrossSignal::BullishCross {
                    bullish_at.push(end - 1);
                }
            }
            assert_eq!(bullish_at.len(), 1, "EMA{period} crosses: {bullish_at:?}");

            // The crossing index is the first rising-phase close above the EMA.
            let expected = (100..closes.len())
                .find(|&i| closes[i] > ema[i].unwrap())
                .unwrap();
            assert_eq!(bullish_at[0], expected);
            assert!(closes[expected - 1] <= ema[expected - 1].unwrap());
        }
    }

    #[test]
    fn v_shape_trend_bullish_once_emas_settle_below_price() {
        let closes = v_shape();
        for end in 260..=closes.len() {
            let snap = analyze_closes(closes[..end].to_vec());
            assert_eq!(snap.trend, TrendSignal::Bullish, "prefix {end}");
        }
        // Deep in the decline the stack is bearish.
        let snap = analyze_closes(closes[..95].to_vec());
        assert_eq!(snap.trend, TrendSignal::Bearish);
    }

    #[test]
    fn strictly_rising_series_never_crosses() {
        // Price starts above its lagging EMAs from the seed index onwards, so
        // there is no below-to-above transition to report.
        let closes: Vec<f64> = (1..=300).map(|i| 100.0 + i as f64).collect();
        for end in 2..=closes.len() {
            let snap = analyze_closes(closes[..end].to_vec());
            assert_ne!(snap.price_vs_ema21_cross, CrossSignal::BullishCross);
            assert_ne!(snap.price_vs_ema50_cross, CrossSignal::BullishCross);
        }
        let snap = analyze_closes(closes);
        assert_eq!(snap.price_vs_ema21_cross, CrossSignal::NoCross);
        assert_eq!(snap.trend, TrendSignal::Bullish);
        assert_eq!(snap.rsi, Some(100.0));
        assert_eq!(snap.rsi_zone, Some(RsiZone::Overbought));
    }

    #[test]
    fn ema_values_rise_with_rising_prices() {
        let closes: Vec<f64> = (1..=300).map(|i| i as f64).collect();
        let snap = analyze_closes(closes);
        let e21: Vec<f64> = snap.series.ema21.iter().flatten().copied().collect();
        let e50: Vec<f64> = snap.series.ema50.iter().flatten().copied().collect();
        assert!(e21.windows(2).all(|w| w[1] > w[0]));
        assert!(e50.windows(2).all(|w| w[1] > w[0]));
    }
}
