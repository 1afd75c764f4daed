use serde::Serialize;

use crate::types::Period;

const STOCKS: &[&str] = &[
    "PETR4.SA", "BRKM5.SA", "VALE3.SA", "ITUB4.SA", "BBDC4.SA", "B3SA3.SA", "BRML3.SA",
    "WEGE3.SA", "SUZB3.SA", "CSNA3.SA", "ABEV3.SA", "BBAS3.SA", "BRAP4.SA", "CIEL3.SA",
    "CMIG4.SA", "CPFE3.SA", "CPLE6.SA", "CSAN3.SA", "CYRE3.SA",
];

const CRYPTO: &[&str] = &["BTC-USD", "ETH-USD", "LTC-USD", "BCH-USD"];

const FOREX: &[&str] = &[
    "EURUSD=X", "GBPUSD=X", "USDJPY=X", "USDCAD=X", "USDCHF=X", "AUDUSD=X",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stocks,
    Crypto,
    Forex,
}

impl AssetClass {
    pub fn symbols(&self) -> &'static [&'static str] {
        match self {
            Self::Stocks => STOCKS,
            Self::Crypto => CRYPTO,
            Self::Forex => FOREX,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetGroup {
    pub class: AssetClass,
    pub symbols: &'static [&'static str],
}

/// Selectable instruments and periods offered by the UI.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub groups: Vec<AssetGroup>,
    pub periods: Vec<Period>,
    pub default_period: Period,
}

pub fn catalog(default_period: Period) -> Catalog {
    let groups = [AssetClass::Stocks, AssetClass::Crypto, AssetClass::Forex]
        .into_iter()
        .map(|class| AssetGroup {
            class,
            symbols: class.symbols(),
        })
        .collect();
    Catalog {
        groups,
        periods: Period::ALL.to_vec(),
        default_period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::normalize_symbol;

    #[test]
    fn every_catalog_symbol_is_a_valid_cache_key() {
        for class in [AssetClass::Stocks, AssetClass::Crypto, AssetClass::Forex] {
            for sym in class.symbols() {
                assert_eq!(normalize_symbol(sym).unwrap(), *sym);
            }
        }
    }

    #[test]
    fn catalog_lists_all_periods() {
        let c = catalog(Period::OneYear);
        assert_eq!(c.groups.len(), 3);
        assert_eq!(c.periods.len(), 10);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["groups"][1]["class"], "crypto");
        assert_eq!(json["periods"][0], "1d");
    }
}
