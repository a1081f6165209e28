use super::{
    signals::{rsi_signal, SignalError},
    Strategy,
};
use crate::indicators::{frame::RSI, rsi_indicator, IndicatorFrame};
use crate::models::{CandleSeries, Signal};

/// Mean-reverting RSI threshold strategy
///
/// Offered as an alternative to the MACD strategy, never combined with it.
#[derive(Debug, Clone)]
pub struct RsiStrategy {
    period: usize,
}

impl RsiStrategy {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Default for RsiStrategy {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Strategy for RsiStrategy {
    fn analyze(&self, candles: &CandleSeries) -> IndicatorFrame {
        rsi_indicator(candles, self.period)
    }

    fn evaluate(&self, frame: &IndicatorFrame) -> Result<Signal, SignalError> {
        let rsi = frame
            .latest(RSI)
            .ok_or(SignalError::InsufficientData {
                available: frame.len(),
                required: self.min_candles_required(),
            })?;

        Ok(rsi_signal(rsi))
    }

    fn name(&self) -> &str {
        "RsiStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.period + 1
    }

    /// Distance of the latest RSI from the neutral 50 line
    fn strength(&self, frame: &IndicatorFrame) -> Option<f64> {
        frame.latest(RSI).map(|rsi| rsi - 50.0)
    }
}
