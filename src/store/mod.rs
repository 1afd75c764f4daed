pub mod export;
pub mod memo;
pub mod series_store;
pub mod snapshot;

// Re-exported for convenient access (e.g. `use crate::store::SeriesStore`).
pub use export::{combine_entries, ExportSummary};
pub use memo::{MemoKey, SeriesMemo};
pub use series_store::SeriesStore;
