// =============================================================================
// Dashboard payloads
// =============================================================================
//
// Data-side helpers for the browser UI: headline metrics per instrument, the
// table view rows and the instrument catalog. Rendering happens client-side.

pub mod catalog;
pub mod metrics;
pub mod table;

pub use catalog::catalog;
pub use metrics::{summary_metrics, SummaryMetrics};
pub use table::{build_table, TableRow};
