// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   alpha = 2 / (span + 1)
//   EMA_0 = close_0
//   EMA_t = close_t * alpha + EMA_{t-1} * (1 - alpha)
//
// The series is seeded with the first observation (no SMA warm-up), so every
// row has a value. Values are left unrounded; callers round the final lines.
// =============================================================================

/// Recursive EMA over `values` with the given `span`.
///
/// Returns an empty `Vec` for `span == 0` or empty input. A non-finite
/// intermediate value stops the series; the remaining rows are dropped.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    if !prev.is_finite() {
        return result;
    }
    result.push(prev);

    for &v in &values[1..] {
        let next = v * alpha + prev * (1.0 - alpha);
        if !next.is_finite() {
            break;
        }
        result.push(next);
        prev = next;
    }
    result
}
