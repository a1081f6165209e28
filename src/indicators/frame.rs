use crate::models::{CandleFrame, CandleSeries};

pub const EMA_FAST: &str = "ema_fast";
pub const EMA_SLOW: &str = "ema_slow";
pub const MACD_LINE: &str = "macd_line";
pub const MACD_SIGNAL: &str = "macd_signal";
pub const RSI: &str = "rsi";
pub const MONEY_FLOW_INDEX: &str = "money_flow_index";

/// A candle projection augmented with derived indicator columns
///
/// Every derived column has one entry per row; `None` marks rows where the
/// indicator is still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    symbol: String,
    base: CandleFrame,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl IndicatorFrame {
    pub fn from_series(series: &CandleSeries) -> Self {
        Self {
            symbol: series.symbol().to_string(),
            base: series.frame().clone(),
            columns: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn base(&self) -> &CandleFrame {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Add a derived column, replacing any existing column with the same name
    pub fn insert_column(&mut self, name: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.len());

        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Value of `name` in the most recent row
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.column(name)?.last().copied().flatten()
    }
}
