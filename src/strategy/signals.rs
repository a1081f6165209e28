use thiserror::Error;

use crate::models::Signal;

/// Minimum trailing histogram values the MACD rules look at
pub const MACD_WINDOW: usize = 4;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("Insufficient data: {available} values, need {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("Indicator frame has no {0} columns")]
    MissingIndicator(&'static str),
}

/// Classify the MACD histogram (oldest first) into a trading signal
///
/// Looks at the newest value `h1` and its predecessors `h2..h4`:
/// - `h1 > 0` and `h1 >= h2 >= h3`: momentum positive and building, BUY
/// - `0 < h1 <= h2 <= h3 <= h4`: momentum positive but fading, SELL
/// - `h1 > 0` otherwise: HOLD
/// - `h1 <= 0`: SELL
///
/// The BUY rule is checked first, so a flat positive run is a BUY.
pub fn macd_signal(histogram: &[f64]) -> Result<Signal, SignalError> {
    if histogram.len() < MACD_WINDOW {
        return Err(SignalError::InsufficientData {
            available: histogram.len(),
            required: MACD_WINDOW,
        });
    }

    let n = histogram.len();
    let (h1, h2, h3, h4) = (
        histogram[n - 1],
        histogram[n - 2],
        histogram[n - 3],
        histogram[n - 4],
    );

    let signal = if h1 > 0.0 && h1 >= h2 && h2 >= h3 {
        Signal::Buy
    } else if 0.0 < h1 && h1 <= h2 && h2 <= h3 && h3 <= h4 {
        Signal::Sell
    } else if h1 > 0.0 {
        Signal::Hold
    } else {
        Signal::Sell
    };

    Ok(signal)
}

/// Overbought/oversold classification of the latest RSI value
pub fn rsi_signal(rsi: f64) -> Signal {
    if rsi < RSI_OVERSOLD {
        Signal::Buy
    } else if rsi > RSI_OVERBOUGHT {
        Signal::Sell
    } else {
        Signal::Hold
    }
}
