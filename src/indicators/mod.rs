// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators shown on the
// dashboard. Every series function returns one `Option<f64>` per input close
// so the output lines up with the price rows; `None` marks an undefined value.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::bollinger_bands;
pub use macd::macd;
pub use rsi::rsi;
pub use sma::moving_average;

use crate::types::{EnrichedBar, PriceBar};

pub const MA_SHORT_WINDOW: usize = 50;
pub const MA_LONG_WINDOW: usize = 200;
pub const RSI_WINDOW: usize = 14;
pub const BOLLINGER_WINDOW: usize = 20;
pub const MACD_SHORT_SPAN: usize = 12;
pub const MACD_LONG_SPAN: usize = 26;

/// Round to 2 decimals, ties to even on the scaled value.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Attach every indicator column to a price series.
///
/// Indicators are always computed over the full slice, so warm-up values at
/// the start of a merged series are correct.
pub fn enrich(bars: &[PriceBar]) -> Vec<EnrichedBar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ma50 = moving_average(&closes, MA_SHORT_WINDOW);
    let ma200 = moving_average(&closes, MA_LONG_WINDOW);
    let rsi = rsi(&closes, RSI_WINDOW);
    let bands = bollinger_bands(&closes, BOLLINGER_WINDOW);
    let lines = macd(&closes, MACD_SHORT_SPAN, MACD_LONG_SPAN);

    bars.iter()
        .enumerate()
        .map(|(i, b)| EnrichedBar {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            ma50: ma50[i],
            ma200: ma200[i],
            rsi: rsi[i],
            upper_bb: bands.upper[i],
            lower_bb: bands.lower[i],
            macd: lines.macd[i],
            signal: lines.signal[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    date: start + chrono::Days::new(i as u64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn round2_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-2.5), -2.5);
        assert_eq!(round2(12.3456), 12.35);
    }

    #[test]
    fn enrich_keeps_rows_aligned() {
        let input = bars(250);
        let out = enrich(&input);
        assert_eq!(out.len(), input.len());
        for (b, e) in input.iter().zip(out.iter()) {
            assert_eq!(&e.price_bar(), b);
        }
    }

    #[test]
    fn enrich_warm_up_prefixes() {
        let out = enrich(&bars(250));
        assert!(out[..49].iter().all(|b| b.ma50.is_none()));
        assert!(out[49].ma50.is_some());
        assert!(out[..199].iter().all(|b| b.ma200.is_none()));
        assert!(out[199].ma200.is_some());
        assert!(out[..14].iter().all(|b| b.rsi.is_none()));
        assert_eq!(out[14].rsi, Some(100.0));
        assert!(out[..19].iter().all(|b| b.upper_bb.is_none()));
        assert!(out[19].lower_bb.is_some());
        assert!(out.iter().all(|b| b.macd.is_some() && b.signal.is_some()));
    }

    #[test]
    fn enrich_empty_input() {
        assert!(enrich(&[]).is_empty());
    }
}
