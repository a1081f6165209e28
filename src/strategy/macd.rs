use super::{
    signals::{macd_signal, SignalError, MACD_WINDOW},
    Strategy,
};
use crate::indicators::{macd_histogram, macd_indicator, IndicatorFrame, MacdParams};
use crate::models::{CandleSeries, Signal};

/// MACD histogram momentum strategy
///
/// Buys into positive and strengthening momentum and exits as soon as the
/// histogram turns non-positive or has been shrinking for four bars.
#[derive(Debug, Clone, Default)]
pub struct MacdStrategy {
    params: MacdParams,
}

impl MacdStrategy {
    pub fn new(params: MacdParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MacdParams {
        &self.params
    }
}

impl Strategy for MacdStrategy {
    fn analyze(&self, candles: &CandleSeries) -> IndicatorFrame {
        macd_indicator(candles, &self.params)
    }

    fn evaluate(&self, frame: &IndicatorFrame) -> Result<Signal, SignalError> {
        let histogram =
            macd_histogram(frame).ok_or(SignalError::MissingIndicator("MACD"))?;
        macd_signal(&histogram)
    }

    fn name(&self) -> &str {
        "MacdStrategy"
    }

    fn min_candles_required(&self) -> usize {
        MACD_WINDOW
    }

    /// Latest histogram value
    fn strength(&self, frame: &IndicatorFrame) -> Option<f64> {
        macd_histogram(frame)?.last().copied()
    }
}
