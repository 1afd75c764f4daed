// =============================================================================
// Summary metrics — the headline numbers shown above each instrument's charts
// =============================================================================

use serde::Serialize;

use crate::types::EnrichedSeries;

/// Message reported when a series is too short for metrics.
pub const NOT_ENOUGH_DATA: &str = "not enough data to display metrics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// Last close vs prior close plus the last bar's range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub last_close: f64,
    pub prior_close: f64,
    pub day_high: f64,
    pub day_low: f64,
    /// (last - prior) / prior * 100
    pub change_pct: f64,
    pub direction: Direction,
}

/// Compute headline metrics. Returns `None` with fewer than 2 bars or a
/// prior close of zero.
pub fn summary_metrics(series: &EnrichedSeries) -> Option<SummaryMetrics> {
    let [.., prior, last] = series.bars.as_slice() else {
        return None;
    };
    if prior.close == 0.0 {
        return None;
    }

    let change_pct = (last.close - prior.close) / prior.close * 100.0;
    let direction = if change_pct > 0.0 {
        Direction::Up
    } else if change_pct < 0.0 {
        Direction::Down
    } else {
        Direction::Flat
    };

    Some(SummaryMetrics {
        last_close: last.close,
        prior_close: prior.close,
        day_high: last.high,
        day_low: last.low,
        change_pct,
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::enrich;
    use crate::types::PriceBar;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> EnrichedSeries {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Days::new(i as u64),
                open: c,
                high: c + 2.0,
                low: c - 3.0,
                close: c,
                volume: 1.0,
            })
            .collect();
        EnrichedSeries {
            symbol: "BBAS3.SA".into(),
            bars: enrich(&bars),
        }
    }

    #[test]
    fn metrics_from_last_two_bars() {
        let m = summary_metrics(&series(&[10.0, 20.0, 25.0])).unwrap();
        assert_eq!(m.last_close, 25.0);
        assert_eq!(m.prior_close, 20.0);
        assert_eq!(m.day_high, 27.0);
        assert_eq!(m.day_low, 22.0);
        assert!((m.change_pct - 25.0).abs() < 1e-12);
        assert_eq!(m.direction, Direction::Up);
    }

    #[test]
    fn metrics_down_and_flat() {
        assert_eq!(summary_metrics(&series(&[10.0, 8.0])).unwrap().direction, Direction::Down);
        assert_eq!(summary_metrics(&series(&[10.0, 10.0])).unwrap().direction, Direction::Flat);
    }

    #[test]
    fn metrics_need_two_bars() {
        assert!(summary_metrics(&series(&[])).is_none());
        assert!(summary_metrics(&series(&[10.0])).is_none());
    }

    #[test]
    fn metrics_zero_prior_close_is_none() {
        assert!(summary_metrics(&series(&[0.0, 1.0])).is_none());
    }
}
