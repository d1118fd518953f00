// =============================================================================
// Exponential Moving Average (EMA) — index-aligned output
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = EMA_{t-1} + (value_t - EMA_{t-1}) * multiplier
//
// The first EMA value sits at index `period - 1` and is seeded with the SMA of
// the first `period` values. Every earlier index is `None`, so the output can
// be zipped index-for-index with the input and with other aligned series.
// =============================================================================

/// Compute the aligned EMA series for `values` and look-back `period`.
///
/// Returns an empty `Vec` when the input is too short or the period is zero.
/// Otherwise the output has exactly `values.len()` entries.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = vec![None; period - 1];
    result.reserve(values.len() - period + 1);

    // Seed: SMA of the first `period` values.
    let mut prev_ema = values[..period].iter().sum::<f64>() / period as f64;
    result.push(Some(prev_ema));

    for &value in &values[period..] {
        prev_ema += (value - prev_ema) * multiplier;
        result.push(Some(prev_ema));
    }

    result
}

/// EMA over only the present entries of an aligned series, written back onto
/// the original index space.
///
/// Absent entries are skipped (never treated as zero) and stay absent in the
/// output. Returns an all-`None` series of the same length when fewer than
/// `period` entries are present.
pub fn calculate_ema_skipping_gaps(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let present: Vec<(usize, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    let compact: Vec<f64> = present.iter().map(|&(_, v)| v).collect();
    let smoothed = calculate_ema(&compact, period);

    let mut result = vec![None; series.len()];
    for (&(index, _), value) in present.iter().zip(smoothed) {
        result[index] = value;
    }
    result
}

/// Last value of an aligned series, if present.
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}
