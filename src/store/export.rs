// =============================================================================
// Combined export — every cache entry concatenated into one snapshot
// =============================================================================
//
// Reads `<data_dir>/*.json` in file-name order (skipping the export itself and
// any temp-file leftovers) and writes `<data_dir>/all_data.json`. Entries that
// cannot be read are skipped with a warning. Entries are never modified.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::snapshot::{CombinedSnapshot, Snapshot};
use crate::types::COMBINED_STEM;

/// Outcome of one combine run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub symbols: Vec<String>,
    pub rows: usize,
    pub skipped: usize,
}

/// Location of the combined export inside `data_dir`.
pub fn combined_path(data_dir: &Path) -> PathBuf {
    data_dir.join(format!("{COMBINED_STEM}.json"))
}

/// Per-symbol snapshot files in `data_dir`, sorted by file name.
pub fn entry_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let combined = combined_path(data_dir);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(data_dir)
        .with_context(|| format!("failed to list {}", data_dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to list {}", data_dir.display()))?
            .path();
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json && path != combined && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenate every entry in `data_dir` into the combined export.
pub fn combine_entries(data_dir: &Path) -> Result<ExportSummary> {
    let mut combined = CombinedSnapshot::new(Utc::now());
    let mut symbols = Vec::new();
    let mut skipped = 0;

    for path in entry_files(data_dir)? {
        match Snapshot::read(&path).and_then(Snapshot::into_series) {
            Ok(series) => {
                combined.push_series(&series);
                symbols.push(series.symbol);
            }
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), error = %e, "skipping unreadable cache entry");
            }
        }
    }

    let path = combined_path(data_dir);
    combined.write(&path)?;

    let summary = ExportSummary {
        path,
        symbols,
        rows: combined.rows(),
        skipped,
    };
    info!(
        path = %summary.path.display(),
        entries = summary.symbols.len(),
        rows = summary.rows,
        skipped = summary.skipped,
        "combined export written"
    );
    Ok(summary)
}
