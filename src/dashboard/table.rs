use serde::Serialize;

use crate::types::EnrichedSeries;

pub const UP_GLYPH: &str = "🔼";
pub const DOWN_GLYPH: &str = "🔽";

/// One row of the tabular view, already formatted for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub symbol: String,
    /// dd/mm/YYYY
    pub date: String,
    /// Up/down glyph versus the previous close of the same symbol.
    pub change: &'static str,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: f64,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi: Option<f64>,
    pub upper_bb: Option<f64>,
    pub lower_bb: Option<f64>,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
}

/// Flatten several series into table rows, in the order given.
pub fn build_table<'a>(
    series: impl IntoIterator<Item = &'a EnrichedSeries>,
    currency_prefix: &str,
) -> Vec<TableRow> {
    let money = |v: f64| format!("{currency_prefix} {v:.2}");
    let mut rows = Vec::new();

    for s in series {
        let mut prev_close: Option<f64> = None;
        for b in &s.bars {
            let change = match prev_close {
                Some(p) if b.close > p => UP_GLYPH,
                Some(p) if b.close < p => DOWN_GLYPH,
                _ => "",
            };
            prev_close = Some(b.close);

            rows.push(TableRow {
                symbol: s.symbol.clone(),
                date: b.date.format("%d/%m/%Y").to_string(),
                change,
                open: money(b.open),
                high: money(b.high),
                low: money(b.low),
                close: money(b.close),
                volume: b.volume,
                ma50: b.ma50,
                ma200: b.ma200,
                rsi: b.rsi,
                upper_bb: b.upper_bb,
                lower_bb: b.lower_bb,
                macd: b.macd,
                signal: b.signal,
            });
        }
    }
    rows
}
