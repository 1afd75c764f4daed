// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = (close_{t-window+1} + ... + close_t) / window
//
// Each value depends only on the trailing `window` closes ending at t, so the
// first `window - 1` rows are undefined.
// =============================================================================

use super::round2;

/// Rolling mean over `window` closes, rounded to 2 decimals.
///
/// Output is aligned with `closes`; rows without a full window are `None`.
pub fn moving_average(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_mean(closes, window)
        .into_iter()
        .map(|v| v.map(round2))
        .collect()
}

/// Unrounded rolling mean. Shared with RSI and Bollinger Bands.
///
/// Every window is summed directly rather than with a running add/remove sum,
/// so a window of exact zeros averages to exactly zero.
pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let w = window as f64;
    for end in window - 1..values.len() {
        let slice = &values[end + 1 - window..=end];
        let mean = slice.iter().sum::<f64>() / w;
        if mean.is_finite() {
            out[end] = Some(mean);
        }
    }
    out
}
