// =============================================================================
// Market data providers
// =============================================================================
//
// The cache store only sees the `DataProvider` trait; the HTTP client lives in
// `yahoo`. An empty `Vec` means the provider has no data for the request.

pub mod yahoo;

use std::future::Future;

use anyhow::Result;

use crate::types::{Period, PriceBar};

pub use yahoo::YahooClient;

/// Source of daily price history for one instrument.
pub trait DataProvider: Send + Sync {
    /// Fetch daily bars for `symbol` covering `period`, oldest first, with
    /// strictly increasing dates.
    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
    ) -> impl Future<Output = Result<Vec<PriceBar>>> + Send;
}
