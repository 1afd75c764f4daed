// =============================================================================
// Central Application State — Market Lens
// =============================================================================
//
// Ties the cache store, the in-process memo and the recent-error log together
// for the API handlers. Every request runs one sequential pass through
// `load_series`: memo first, then the store (which decides on staleness).
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the error log; the memo manages its own lock.
//   - The store serialises its own disk writes.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::provider::DataProvider;
use crate::runtime_config::RuntimeConfig;
use crate::store::{MemoKey, SeriesMemo, SeriesStore};
use crate::types::{normalize_symbol, EnrichedSeries, Period};

// =============================================================================
// Error Record
// =============================================================================

/// A per-symbol failure shown in the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub symbol: String,
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// AppState
// =============================================================================

/// Shared state handed to every API handler via `Arc<AppState<P>>`.
pub struct AppState<P> {
    /// Incremented whenever cached data is refreshed or discarded.
    pub state_version: AtomicU64,
    pub config: RuntimeConfig,
    pub store: SeriesStore<P>,
    pub memo: SeriesMemo,
    pub recent_errors: RwLock<VecDeque<ErrorRecord>>,
}

impl<P: DataProvider> AppState<P> {
    pub fn new(config: RuntimeConfig, provider: P) -> Result<Self> {
        let store = SeriesStore::new(provider, config.data_dir.clone())?;
        let memo = SeriesMemo::new(config.memo_ttl());
        Ok(Self {
            state_version: AtomicU64::new(0),
            config,
            store,
            memo,
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
        })
    }

    /// Memoized series for `symbol`, falling through to the cache store.
    pub async fn load_series(&self, symbol: &str, period: Period) -> Result<Arc<EnrichedSeries>> {
        let symbol = normalize_symbol(symbol)?;
        let key = MemoKey::new(symbol.clone(), period);
        if let Some(hit) = self.memo.get(&key) {
            debug!(key = %key, "memo hit");
            return Ok(hit);
        }

        let series = Arc::new(self.store.get_series(&symbol, period).await?);
        if !series.is_empty() {
            self.memo.insert(key, series.clone());
            self.increment_version();
        }
        Ok(series)
    }

    /// Drop memoized results for `symbols` and load them again.
    pub async fn refresh(
        &self,
        symbols: &[String],
        period: Period,
    ) -> Vec<(String, Result<Arc<EnrichedSeries>>)> {
        let mut out = Vec::with_capacity(symbols.len());
        for raw in symbols {
            let result = match normalize_symbol(raw) {
                Ok(symbol) => {
                    self.memo.invalidate(&symbol);
                    self.load_series(&symbol, period).await
                }
                Err(e) => Err(e),
            };
            out.push((raw.clone(), result));
        }
        out
    }

    /// Discard every memoized result; on-disk entries are untouched.
    pub fn clear_memo(&self) -> usize {
        let removed = self.memo.clear();
        self.increment_version();
        removed
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Relaxed)
    }

    pub fn push_error(&self, symbol: &str, message: impl Into<String>) {
        let mut errors = self.recent_errors.write();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(ErrorRecord {
            symbol: symbol.to_string(),
            message: message.into(),
            at: Utc::now().to_rfc3339(),
        });
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().iter().cloned().collect()
    }
}
