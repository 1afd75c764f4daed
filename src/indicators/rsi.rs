// =============================================================================
// Relative Strength Index (RSI) — simple-average variant
// =============================================================================
//
// Step 1 — delta_t = close_t - close_{t-1}  (undefined for t = 0)
// Step 2 — gain_t = max(delta_t, 0),  loss_t = |min(delta_t, 0)|
// Step 3 — avg_gain / avg_loss = simple rolling mean over `window` deltas
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS), rounded to 2 decimals
//
// The division follows IEEE semantics: only gains gives RS = inf and
// RSI = 100, no movement at all gives 0 / 0 and the value is undefined.
// =============================================================================

use super::round2;
use super::sma::rolling_mean;

/// Compute the RSI series for `closes`, aligned one-to-one with the input.
///
/// # Edge cases
/// - `window == 0` => all `None`
/// - the first `window` rows are `None` (the first delta does not exist)
/// - a window with no price movement => `None`
pub fn rsi(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() <= window {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|&d| if d > 0.0 { d } else { 0.0 }).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| if d < 0.0 { -d } else { 0.0 }).collect();

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    // deltas[i] belongs to closes[i + 1].
    for (i, (g, l)) in avg_gain.iter().zip(avg_loss.iter()).enumerate() {
        if let (Some(g), Some(l)) = (g, l) {
            out[i + 1] = rsi_from_averages(*g, *l);
        }
    }
    out
}

/// Convert average gain / average loss into a rounded RSI value.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rs = avg_gain / avg_loss;
    let value = 100.0 - 100.0 / (1.0 + rs);
    value.is_finite().then(|| round2(value))
}
