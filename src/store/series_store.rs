// =============================================================================
// Series Store — per-symbol on-disk cache with a trading-day staleness rule
// =============================================================================
//
// get_series(symbol, period):
//   * no entry on disk   -> fetch, enrich, persist, return
//   * entry is current   -> return it as stored
//   * entry is stale     -> fetch, merge (stored rows win on duplicate dates),
//                           re-enrich the full merged series, persist, return
//
// An entry is stale when today's local date is strictly after its last bar.
// An entry that cannot be read is treated as missing and rebuilt.
// Work on one symbol is serialised by a per-symbol lock; other symbols are
// never blocked by a slow fetch. Writes land via temp file + rename.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::snapshot::Snapshot;
use crate::indicators::enrich;
use crate::provider::DataProvider;
use crate::types::{normalize_symbol, EnrichedSeries, Period, PriceBar};

/// Local cache store in front of a [`DataProvider`].
pub struct SeriesStore<P> {
    provider: P,
    data_dir: PathBuf,
    entry_locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<P: DataProvider> SeriesStore<P> {
    /// Create a store rooted at `data_dir`, creating the directory if needed.
    pub fn new(provider: P, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        Ok(Self {
            provider,
            data_dir,
            entry_locks: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Snapshot file for a (normalised) symbol.
    pub fn entry_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.json"))
    }

    /// Enriched series for `symbol`, refreshed from the provider when missing
    /// or stale. An empty result means the provider had no data.
    pub async fn get_series(&self, symbol: &str, period: Period) -> Result<EnrichedSeries> {
        self.get_series_at(symbol, period, Local::now().date_naive())
            .await
    }

    /// [`get_series`](Self::get_series) with an explicit current date.
    pub async fn get_series_at(
        &self,
        symbol: &str,
        period: Period,
        today: NaiveDate,
    ) -> Result<EnrichedSeries> {
        let symbol = normalize_symbol(symbol)?;
        let path = self.entry_path(&symbol);
        let lock = self.entry_lock(&symbol);
        let _guard = lock.lock().await;

        if !path.exists() {
            return self.fetch_new(symbol, period, &path).await;
        }

        let stored = match Snapshot::read(&path).and_then(Snapshot::into_series) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(%symbol, error = %e, "unreadable cache entry, rebuilding");
                return self.fetch_new(symbol, period, &path).await;
            }
        };
        if !is_stale(stored.last_date(), today) {
            debug!(%symbol, rows = stored.len(), "cache entry is current");
            return Ok(stored);
        }

        let fresh = match self.provider.fetch_history(&symbol, period).await {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!(%symbol, %period, "refresh returned no rows, serving stored entry");
                return Ok(stored);
            }
            Err(e) => {
                warn!(%symbol, %period, error = %e, "refresh failed, serving stored entry");
                return Ok(stored);
            }
        };

        let existing: Vec<PriceBar> = stored.bars.iter().map(|b| b.price_bar()).collect();
        let before = existing.len();
        let merged = merge_bars(existing, fresh);
        let series = EnrichedSeries {
            symbol,
            bars: enrich(&merged),
        };
        Snapshot::new(&series, Utc::now()).write(&path)?;

        info!(
            symbol = %series.symbol,
            %period,
            rows = series.len(),
            added = series.len().saturating_sub(before),
            "cache entry refreshed"
        );
        Ok(series)
    }

    /// Lock guarding the entry of one symbol.
    fn entry_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        self.entry_locks
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    async fn fetch_new(&self, symbol: String, period: Period, path: &Path) -> Result<EnrichedSeries> {
        let bars = self
            .provider
            .fetch_history(&symbol, period)
            .await
            .with_context(|| format!("failed to fetch history for {symbol}"))?;

        if bars.is_empty() {
            warn!(%symbol, %period, "provider returned no rows");
            return Ok(EnrichedSeries::empty(symbol));
        }

        let series = EnrichedSeries {
            symbol,
            bars: enrich(&bars),
        };
        Snapshot::new(&series, Utc::now()).write(path)?;
        info!(symbol = %series.symbol, %period, rows = series.len(), "cache entry created");
        Ok(series)
    }
}

/// An entry is stale once the current date is past its last stored bar.
pub fn is_stale(last_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_date.map_or(true, |last| today > last)
}

/// Append `fresh` to `existing`, keep the first bar seen for each date and
/// order the result by date.
pub fn merge_bars(existing: Vec<PriceBar>, fresh: Vec<PriceBar>) -> Vec<PriceBar> {
    let mut merged = existing;
    merged.extend(fresh);
    // Stable sort: for equal dates the earlier (stored) bar stays first.
    merged.sort_by_key(|b| b.date);
    merged.dedup_by_key(|b| b.date);
    merged
}
