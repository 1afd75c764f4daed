// =============================================================================
// Shared types used across the Market Lens backend
// =============================================================================

use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// File stem reserved for the combined export; never a valid symbol.
pub const COMBINED_STEM: &str = "all_data";

/// Longest symbol accepted as a cache key.
const MAX_SYMBOL_LEN: usize = 32;

/// One daily OHLCV record as returned by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A [`PriceBar`] plus every derived indicator column.
///
/// `None` marks a value that is undefined for this row (warm-up prefix, or a
/// division by zero inside RSI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi: Option<f64>,
    pub upper_bb: Option<f64>,
    pub lower_bb: Option<f64>,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
}

impl EnrichedBar {
    /// Strip the derived columns, keeping the raw provider record.
    pub fn price_bar(&self) -> PriceBar {
        PriceBar {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Price history for one instrument with all indicator columns attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSeries {
    pub symbol: String,
    pub bars: Vec<EnrichedBar>,
}

impl EnrichedSeries {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// History window requested from the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "4y")]
    FourYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Period {
    pub const ALL: [Period; 10] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::TwoYears,
        Period::ThreeYears,
        Period::FourYears,
        Period::FiveYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::ThreeYears => "3y",
            Self::FourYears => "4y",
            Self::FiveYears => "5y",
        }
    }

    /// Calendar days covered by the period.
    pub fn days(&self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::FiveDays => 5,
            Self::OneMonth => 30,
            Self::ThreeMonths => 91,
            Self::SixMonths => 182,
            Self::OneYear => 365,
            Self::TwoYears => 730,
            Self::ThreeYears => 1095,
            Self::FourYears => 1461,
            Self::FiveYears => 1826,
        }
    }
}

impl Default for Period {
    fn default() -> Self {
        Self::OneYear
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("unknown period '{s}'"))
    }
}

/// Normalise and validate a ticker so it is safe to use as a file stem.
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        bail!("symbol must not be empty");
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        bail!("symbol '{symbol}' is longer than {MAX_SYMBOL_LEN} characters");
    }
    if symbol.eq_ignore_ascii_case(COMBINED_STEM) {
        bail!("symbol '{symbol}' is reserved");
    }
    if let Some(bad) = symbol
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '=' | '^' | '_')))
    {
        bail!("symbol '{symbol}' contains invalid character '{bad}'");
    }
    if symbol.starts_with('.') {
        bail!("symbol '{symbol}' must not start with '.'");
    }
    Ok(symbol)
}
