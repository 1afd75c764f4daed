// =============================================================================
// Yahoo Finance chart API client — daily OHLCV history
// =============================================================================
//
// GET {base}/v8/finance/chart/{symbol}?interval=1d&range={period}
//
// Yahoo has no native range for 3y / 4y; those periods are requested with an
// explicit period1 / period2 window instead. Every request is bounded by the
// client timeout, so a stalled provider surfaces as an error.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::DataProvider;
use crate::types::{Period, PriceBar};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) market-lens/1.0";

/// HTTP client for the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooClient {
    base_url: Url,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client against `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid provider url '{base_url}'"))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build provider HTTP client")?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "YahooClient initialised");

        Ok(Self { base_url, client })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("provider url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    /// GET /v8/finance/chart/{symbol} with a daily interval.
    #[instrument(skip(self), name = "yahoo::get_chart")]
    async fn get_chart(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(symbol)?;
        let mut query: Vec<(&str, String)> = vec![("interval", "1d".to_string())];
        match native_range(period) {
            Some(range) => query.push(("range", range.to_string())),
            None => {
                let now = Utc::now().timestamp();
                query.push(("period1", (now - period.days() * 86_400).to_string()));
                query.push(("period2", now.to_string()));
            }
        }

        let resp = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("GET chart for {symbol} failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read chart body for {symbol}"))?;

        if status == StatusCode::NOT_FOUND {
            warn!(symbol, "provider has no data for symbol");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("provider chart request for {symbol} returned {status}: {body}");
        }

        let bars = parse_chart_response(&body)?;
        debug!(symbol, %period, rows = bars.len(), "history fetched");
        Ok(bars)
    }
}

impl DataProvider for YahooClient {
    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<Vec<PriceBar>> {
        self.get_chart(symbol, period).await
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

/// Range token understood by Yahoo, if the period has one.
fn native_range(period: Period) -> Option<&'static str> {
    match period {
        Period::ThreeYears | Period::FourYears => None,
        other => Some(other.as_str()),
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Parse a chart API body into daily bars, oldest first.
///
/// Rows with a missing open/high/low/close are skipped; a missing volume is
/// read as zero. Duplicate dates keep the first row. A "Not Found" chart
/// error yields an empty result; any other chart error is an error.
pub fn parse_chart_response(body: &str) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).context("failed to parse chart response")?;

    if let Some(err) = envelope.chart.error {
        if err.code == "Not Found" {
            return Ok(Vec::new());
        }
        anyhow::bail!("provider error {}: {}", err.code, err.description);
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.and_then(|i| i.quote.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let field = |col: &[Option<f64>]| col.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        let date = exchange_date(ts, result.meta.gmtoffset)
            .with_context(|| format!("timestamp {ts} out of range"))?;
        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume: field(&quote.volume).unwrap_or(0.0),
        });
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

/// Trading date of a UTC timestamp in the exchange's local time.
fn exchange_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}
