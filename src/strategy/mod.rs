// Trading strategy module
pub mod macd;
pub mod rsi;
pub mod signals;

pub use macd::MacdStrategy;
pub use rsi::RsiStrategy;
pub use signals::SignalError;

use crate::indicators::IndicatorFrame;
use crate::models::{CandleSeries, Signal};

/// Base trait for all trading strategies
///
/// Strategies are stateless: every call re-derives the signal from the candles
/// it is given.
pub trait Strategy: Send + Sync {
    /// Compute the indicator columns this strategy decides on
    fn analyze(&self, candles: &CandleSeries) -> IndicatorFrame;

    /// Derive a signal from a frame produced by [`Strategy::analyze`]
    fn evaluate(&self, frame: &IndicatorFrame) -> Result<Signal, SignalError>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;

    /// Generate a trading signal based on market data
    fn generate_signal(&self, candles: &CandleSeries) -> Result<Signal, SignalError> {
        self.evaluate(&self.analyze(candles))
    }

    /// Magnitude behind the latest signal, if the strategy has one
    fn strength(&self, _frame: &IndicatorFrame) -> Option<f64> {
        None
    }
}
