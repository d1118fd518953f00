// =============================================================================
// Crossover Detection
// =============================================================================
//
// Compares two paired series at their last two points:
//   prev_diff = prev_a - prev_b,  curr_diff = curr_a - curr_b
//   BULLISH_CROSS  when prev_diff <= 0 && curr_diff > 0
//   BEARISH_CROSS  when prev_diff >= 0 && curr_diff < 0
//
// The bullish branch is evaluated first. Both boundaries include equality on
// the previous sample, so a move off an exact tie counts as a cross.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Outcome of comparing two series at their last two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossSignal {
    BullishCross,
    BearishCross,
    NoCross,
    NoData,
}

impl std::fmt::Display for CrossSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BullishCross => write!(f, "BULLISH_CROSS"),
            Self::BearishCross => write!(f, "BEARISH_CROSS"),
            Self::NoCross => write!(f, "NO_CROSS"),
            Self::NoData => write!(f, "NO_DATA"),
        }
    }
}

/// Classify the transition of `a` relative to `b` between two samples.
///
/// Any non-finite argument yields [`CrossSignal::NoData`].
pub fn detect_cross(prev_a: f64, curr_a: f64, prev_b: f64, curr_b: f64) -> CrossSignal {
    if ![prev_a, curr_a, prev_b, curr_b].iter().all(|v| v.is_finite()) {
        return CrossSignal::NoData;
    }

    let prev_diff = prev_a - prev_b;
    let curr_diff = curr_a - curr_b;

    if prev_diff <= 0.0 && curr_diff > 0.0 {
        CrossSignal::BullishCross
    } else if prev_diff >= 0.0 && curr_diff < 0.0 {
        CrossSignal::BearishCross
    } else {
        CrossSignal::NoCross
    }
}

/// Last two entries of an aligned series, both required to be present.
pub fn last_two(series: &[Option<f64>]) -> Option<(f64, f64)> {
    match series {
        [.., Some(prev), Some(curr)] => Some((*prev, *curr)),
        _ => None,
    }
}

/// [`detect_cross`] applied to the tails of two aligned series.
///
/// Absent entries are reported as [`CrossSignal::NoData`] directly rather
/// than being turned into NaN first.
pub fn detect_series_cross(a: &[Option<f64>], b: &[Option<f64>]) -> CrossSignal {
    match (last_two(a), last_two(b)) {
        (Some((prev_a, curr_a)), Some((prev_b, curr_b))) => {
            detect_cross(prev_a, curr_a, prev_b, curr_b)
        }
        _ => CrossSignal::NoData,
    }
}
