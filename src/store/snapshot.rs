// =============================================================================
// Columnar snapshot files — per-symbol cache entries and the combined export
// =============================================================================
//
// One JSON document per symbol:
//
//   { "format": "market-lens/columnar-v1", "symbol": "PETR4.SA",
//     "written_at": "2026-10-17T18:02:11Z",
//     "columns": { "date": [...], "open": [...], ..., "signal": [...] } }
//
// Every column has one entry per row; undefined indicator values are `null`.
// Floats are written in shortest round-trip form and parsed back exactly.
//
// Writes go to a uniquely named temp file in the same directory and are
// renamed over the target, so a reader never sees a partially written file
// and concurrent writers never share a temp file.
// =============================================================================

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::types::{EnrichedBar, EnrichedSeries};

pub const SNAPSHOT_FORMAT: &str = "market-lens/columnar-v1";
pub const COMBINED_FORMAT: &str = "market-lens/columnar-combined-v1";

/// Column-major layout of an enriched series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotColumns {
    pub date: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub ma50: Vec<Option<f64>>,
    pub ma200: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub upper_bb: Vec<Option<f64>>,
    pub lower_bb: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

impl SnapshotColumns {
    pub fn from_bars(bars: &[EnrichedBar]) -> Self {
        let mut cols = Self::default();
        cols.extend(bars);
        cols
    }

    /// Append rows to every column.
    pub fn extend(&mut self, bars: &[EnrichedBar]) {
        for b in bars {
            self.date.push(b.date);
            self.open.push(b.open);
            self.high.push(b.high);
            self.low.push(b.low);
            self.close.push(b.close);
            self.volume.push(b.volume);
            self.ma50.push(b.ma50);
            self.ma200.push(b.ma200);
            self.rsi.push(b.rsi);
            self.upper_bb.push(b.upper_bb);
            self.lower_bb.push(b.lower_bb);
            self.macd.push(b.macd);
            self.signal.push(b.signal);
        }
    }

    pub fn len(&self) -> usize {
        self.date.len()
    }

    /// Rebuild row records, failing if any column length differs or the dates
    /// are not strictly increasing.
    pub fn to_bars(&self) -> Result<Vec<EnrichedBar>> {
        let n = self.len();
        let lengths = [
            ("open", self.open.len()),
            ("high", self.high.len()),
            ("low", self.low.len()),
            ("close", self.close.len()),
            ("volume", self.volume.len()),
            ("ma50", self.ma50.len()),
            ("ma200", self.ma200.len()),
            ("rsi", self.rsi.len()),
            ("upper_bb", self.upper_bb.len()),
            ("lower_bb", self.lower_bb.len()),
            ("macd", self.macd.len()),
            ("signal", self.signal.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != n) {
            bail!("column '{name}' has {len} rows, expected {n}");
        }
        if let Some(pair) = self.date.windows(2).find(|w| w[0] >= w[1]) {
            bail!("dates are not strictly increasing ({} then {})", pair[0], pair[1]);
        }

        Ok((0..n)
            .map(|i| EnrichedBar {
                date: self.date[i],
                open: self.open[i],
                high: self.high[i],
                low: self.low[i],
                close: self.close[i],
                volume: self.volume[i],
                ma50: self.ma50[i],
                ma200: self.ma200[i],
                rsi: self.rsi[i],
                upper_bb: self.upper_bb[i],
                lower_bb: self.lower_bb[i],
                macd: self.macd[i],
                signal: self.signal[i],
            })
            .collect())
    }
}

/// A persisted cache entry for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format: String,
    pub symbol: String,
    /// Freshness timestamp: when this entry was last written.
    pub written_at: DateTime<Utc>,
    pub columns: SnapshotColumns,
}

impl Snapshot {
    pub fn new(series: &EnrichedSeries, written_at: DateTime<Utc>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            symbol: series.symbol.clone(),
            written_at,
            columns: SnapshotColumns::from_bars(&series.bars),
        }
    }

    pub fn into_series(self) -> Result<EnrichedSeries> {
        let bars = self
            .columns
            .to_bars()
            .with_context(|| format!("corrupt snapshot for {}", self.symbol))?;
        Ok(EnrichedSeries {
            symbol: self.symbol,
            bars,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        if snapshot.format != SNAPSHOT_FORMAT {
            bail!(
                "snapshot {} has unsupported format '{}'",
                path.display(),
                snapshot.format
            );
        }
        Ok(snapshot)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)
            .with_context(|| format!("failed to serialise snapshot for {}", self.symbol))?;
        write_atomic(path, content.as_bytes())
    }
}

/// Every entry concatenated, with a per-row symbol column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSnapshot {
    pub format: String,
    pub written_at: DateTime<Utc>,
    pub symbol: Vec<String>,
    pub columns: SnapshotColumns,
}

impl CombinedSnapshot {
    pub fn new(written_at: DateTime<Utc>) -> Self {
        Self {
            format: COMBINED_FORMAT.to_string(),
            written_at,
            symbol: Vec::new(),
            columns: SnapshotColumns::default(),
        }
    }

    pub fn push_series(&mut self, series: &EnrichedSeries) {
        self.symbol
            .extend(std::iter::repeat(series.symbol.clone()).take(series.len()));
        self.columns.extend(&series.bars);
    }

    pub fn rows(&self) -> usize {
        self.symbol.len()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read combined export {}", path.display()))?;
        let combined: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse combined export {}", path.display()))?;
        if combined.format != COMBINED_FORMAT {
            bail!("combined export has unsupported format '{}'", combined.format);
        }
        Ok(combined)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string(self).context("failed to serialise combined export")?;
        write_atomic(path, content.as_bytes())
    }
}

/// Write `bytes` to a fresh temp file beside `path`, then rename it over
/// `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to rename temp file onto {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::enrich;
    use crate::types::PriceBar;

    fn sample_series(n: usize) -> EnrichedSeries {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let bars: Vec<PriceBar> = (0..n)
            .map(|i| {
                let close = 20.0 + (i as f64 * 0.37).sin() * 3.0 + i as f64 * 0.013;
                PriceBar {
                    date: start + chrono::Days::new(i as u64),
                    open: close * 0.997,
                    high: close * 1.011,
                    low: close * 0.989,
                    close,
                    volume: 1_234_567.0 + i as f64,
                }
            })
            .collect();
        EnrichedSeries {
            symbol: "VALE3.SA".to_string(),
            bars: enrich(&bars),
        }
    }

    #[test]
    fn snapshot_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VALE3.SA.json");
        let series = sample_series(260);
        let written_at = Utc::now();

        Snapshot::new(&series, written_at).write(&path).unwrap();
        let first_bytes = std::fs::read(&path).unwrap();

        let loaded = Snapshot::read(&path).unwrap();
        assert_eq!(loaded.written_at, written_at);
        let reloaded = loaded.clone().into_series().unwrap();
        assert_eq!(reloaded, series);

        // Re-serialising what was read yields the same bytes.
        loaded.write(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first_bytes);
    }

    #[test]
    fn undefined_values_are_null() {
        let series = sample_series(3);
        let json = serde_json::to_value(Snapshot::new(&series, Utc::now())).unwrap();
        assert!(json["columns"]["ma50"][0].is_null());
        assert_eq!(json["columns"]["date"][0], "2023-06-01");
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut snapshot = Snapshot::new(&sample_series(5), Utc::now());
        snapshot.columns.rsi.pop();
        assert!(snapshot.into_series().is_err());
    }

    #[test]
    fn unordered_or_duplicate_dates_are_rejected() {
        let mut duplicate = Snapshot::new(&sample_series(3), Utc::now());
        duplicate.columns.date[2] = duplicate.columns.date[1];
        let err = duplicate.into_series().unwrap_err();
        assert!(format!("{err:#}").contains("strictly increasing"));

        let mut unordered = Snapshot::new(&sample_series(3), Utc::now());
        unordered.columns.date.swap(0, 2);
        assert!(unordered.into_series().is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X.json");
        let mut snapshot = Snapshot::new(&sample_series(2), Utc::now());
        snapshot.format = "something-else".to_string();
        snapshot.write(&path).unwrap();
        assert!(Snapshot::read(&path).is_err());
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BTC-USD.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"[]").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"[]");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn concurrent_writes_to_one_path_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_data.json");
        let payloads: Vec<Vec<u8>> = (0..8).map(|i| vec![b'a' + i as u8; 4096]).collect();

        std::thread::scope(|scope| {
            for payload in &payloads {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..20 {
                        write_atomic(path, payload).unwrap();
                    }
                });
            }
        });

        // Whatever won is one complete payload, never a mix.
        let content = std::fs::read(&path).unwrap();
        assert!(payloads.contains(&content));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
