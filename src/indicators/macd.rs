// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
// MACD line   = EMA(short) - EMA(long)
// Signal line = EMA(SIGNAL_SPAN) of the MACD line
//
// Both lines are computed unrounded and rounded to 2 decimals at the end.
// =============================================================================

use super::ema::ema;
use super::round2;

/// Span of the signal-line EMA.
pub const SIGNAL_SPAN: usize = 9;

/// MACD and signal lines, aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdLines {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// Compute MACD and its signal line from `closes`.
///
/// Rows are `None` only where an EMA could not be produced (zero span or a
/// non-finite input cutting the series short).
pub fn macd(closes: &[f64], short_window: usize, long_window: usize) -> MacdLines {
    let n = closes.len();
    let short = ema(closes, short_window);
    let long = ema(closes, long_window);

    let line: Vec<f64> = short.iter().zip(long.iter()).map(|(s, l)| s - l).collect();
    let signal = ema(&line, SIGNAL_SPAN);

    let mut macd_out = vec![None; n];
    let mut signal_out = vec![None; n];
    for (i, v) in line.iter().enumerate() {
        macd_out[i] = Some(round2(*v));
    }
    for (i, v) in signal.iter().enumerate() {
        signal_out[i] = Some(round2(*v));
    }

    MacdLines {
        macd: macd_out,
        signal: signal_out,
    }
}
