// =============================================================================
// Bollinger Bands
// =============================================================================
//
// middle = SMA(window)
// upper  = middle + 2 * sigma
// lower  = middle - 2 * sigma
//
// sigma is the sample standard deviation (n - 1) of the same trailing window.
// Both bands are rounded to 2 decimals; the middle band is the MA column.
// =============================================================================

use super::round2;
use super::sma::rolling_mean;

/// Number of standard deviations between the middle band and each outer band.
pub const NUM_STD: f64 = 2.0;

/// Upper and lower band series, aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands over a rolling `window`.
///
/// Rows without a full window are `None`. A window of 1 is also `None`
/// everywhere, because the sample deviation of one value is undefined.
pub fn bollinger_bands(closes: &[f64], window: usize) -> BollingerBands {
    let n = closes.len();
    let mut upper = vec![None; n];
    let mut lower = vec![None; n];

    if window < 2 {
        return BollingerBands { upper, lower };
    }

    let means = rolling_mean(closes, window);
    for (end, mean) in means.iter().enumerate() {
        let Some(mean) = *mean else { continue };
        let slice = &closes[end + 1 - window..=end];
        let variance =
            slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        let std_dev = variance.sqrt();
        if !std_dev.is_finite() {
            continue;
        }
        upper[end] = Some(round2(mean + NUM_STD * std_dev));
        lower[end] = Some(round2(mean - NUM_STD * std_dev));
    }

    BollingerBands { upper, lower }
}
