use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{EnrichedSeries, Period};

// ---------------------------------------------------------------------------
// MemoKey
// ---------------------------------------------------------------------------

/// Composite key that identifies one memoized result.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MemoKey {
    pub symbol: String,
    pub period: Period,
}

impl MemoKey {
    pub fn new(symbol: impl Into<String>, period: Period) -> Self {
        Self {
            symbol: symbol.into(),
            period,
        }
    }
}

impl std::fmt::Display for MemoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.period)
    }
}

// ---------------------------------------------------------------------------
// SeriesMemo -- in-process results with a time-to-live
// ---------------------------------------------------------------------------

struct MemoEntry {
    series: Arc<EnrichedSeries>,
    stored_at: Instant,
}

/// In-process memo of enriched series keyed by `(symbol, period)`.
///
/// Entries older than the TTL are treated as absent. Clearing the memo never
/// touches the on-disk snapshots; it only forces the next request for every
/// symbol back through the cache store's staleness check.
pub struct SeriesMemo {
    entries: RwLock<HashMap<MemoKey, MemoEntry>>,
    ttl: Duration,
}

impl SeriesMemo {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the memoized series if present and younger than the TTL.
    pub fn get(&self, key: &MemoKey) -> Option<Arc<EnrichedSeries>> {
        {
            let map = self.entries.read();
            match map.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.series.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: evict.
        self.entries.write().remove(key);
        None
    }

    /// Memoize a series. Empty series are ignored so a failed fetch is retried.
    pub fn insert(&self, key: MemoKey, series: Arc<EnrichedSeries>) {
        if series.is_empty() {
            return;
        }
        self.entries.write().insert(
            key,
            MemoEntry {
                series,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every period memoized for `symbol`. Returns how many were removed.
    pub fn invalidate(&self, symbol: &str) -> usize {
        let mut map = self.entries.write();
        let before = map.len();
        map.retain(|k, _| k.symbol != symbol);
        before - map.len()
    }

    /// Drop everything. Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut map = self.entries.write();
        let n = map.len();
        map.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::enrich;
    use crate::types::PriceBar;
    use chrono::NaiveDate;

    fn series(symbol: &str) -> Arc<EnrichedSeries> {
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        };
        Arc::new(EnrichedSeries {
            symbol: symbol.to_string(),
            bars: enrich(&[bar]),
        })
    }

    #[test]
    fn get_returns_inserted_series() {
        let memo = SeriesMemo::new(Duration::from_secs(3600));
        let key = MemoKey::new("ITUB4.SA", Period::OneYear);
        memo.insert(key.clone(), series("ITUB4.SA"));
        assert_eq!(memo.get(&key).unwrap().symbol, "ITUB4.SA");
        assert!(memo.get(&MemoKey::new("ITUB4.SA", Period::FiveDays)).is_none());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let memo = SeriesMemo::new(Duration::ZERO);
        let key = MemoKey::new("ETH-USD", Period::OneMonth);
        memo.insert(key.clone(), series("ETH-USD"));
        assert!(memo.get(&key).is_none());
        assert_eq!(memo.len(), 0);
    }

    #[test]
    fn empty_series_are_not_memoized() {
        let memo = SeriesMemo::new(Duration::from_secs(60));
        memo.insert(
            MemoKey::new("NOPE", Period::OneYear),
            Arc::new(EnrichedSeries::empty("NOPE")),
        );
        assert_eq!(memo.len(), 0);
    }

    #[test]
    fn invalidate_drops_all_periods_of_a_symbol() {
        let memo = SeriesMemo::new(Duration::from_secs(60));
        memo.insert(MemoKey::new("A", Period::OneYear), series("A"));
        memo.insert(MemoKey::new("A", Period::TwoYears), series("A"));
        memo.insert(MemoKey::new("B", Period::OneYear), series("B"));
        assert_eq!(memo.invalidate("A"), 2);
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.clear(), 1);
        assert_eq!(memo.len(), 0);
    }
}
