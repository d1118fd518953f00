// ---------------------------------------------------------------------------
// Kline rows — Binance REST array-of-arrays format
// ---------------------------------------------------------------------------
//
// Array indices:
//   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
//   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
//
// Only the close price and the close time are consumed. Either may arrive as
// a JSON number or as a numeric string.

use serde::{Deserialize, Serialize};

use super::error::MarketDataError;

const ENDPOINT: &str = "klines";

/// Minimum number of fields a row must carry (close time is index 6).
const MIN_ROW_LEN: usize = 7;

/// One candle row reduced to the fields the evaluator needs.
///
/// A `None` close means the field was present but not a finite number; the
/// row is kept so that positions in the payload are preserved for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub close: Option<f64>,
    pub close_time: Option<i64>,
}

#[cfg(test)]
impl Kline {
    pub fn new(close: f64, close_time: i64) -> Self {
        Self {
            close: Some(close).filter(|c| c.is_finite()),
            close_time: Some(close_time),
        }
    }
}

/// Parse the raw klines payload.
///
/// Fails when the body is not an array of arrays, or when any row is too
/// short to contain a close time. An empty array parses to an empty vec.
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Kline>, MarketDataError> {
    let rows = body
        .as_array()
        .ok_or_else(|| MarketDataError::malformed(ENDPOINT, "response is not an array"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let fields = row.as_array().ok_or_else(|| {
                MarketDataError::malformed(ENDPOINT, format!("row {i} is not an array"))
            })?;
            if fields.len() < MIN_ROW_LEN {
                return Err(MarketDataError::malformed(
                    ENDPOINT,
                    format!("row {i} has {} fields, expected at least {MIN_ROW_LEN}", fields.len()),
                ));
            }
            Ok(Kline {
                close: parse_number(&fields[4]),
                close_time: parse_number(&fields[6]).map(|t| t as i64),
            })
        })
        .collect()
}

/// Finite closes in payload order.
pub fn finite_closes(klines: &[Kline]) -> Vec<f64> {
    klines.iter().filter_map(|k| k.close).collect()
}

/// Close price of the row whose close time is nearest to `target_ms`.
///
/// Rows without a usable close or close time are skipped. On equal distance
/// the earlier row wins.
pub fn reference_price(klines: &[Kline], target_ms: i64) -> Option<f64> {
    klines
        .iter()
        .filter_map(|k| Some((k.close_time?, k.close?)))
        .fold(None, |best: Option<(i64, f64)>, (close_time, close)| {
            let distance = (close_time - target_ms).abs();
            match best {
                Some((best_distance, _)) if best_distance <= distance => best,
                _ => Some((distance, close)),
            }
        })
        .map(|(_, close)| close)
}

/// Binance sends numeric values as JSON strings inside kline rows; accept
/// both forms and reject anything non-finite.
pub(crate) fn parse_number(val: &serde_json::Value) -> Option<f64> {
    let n = match val {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
