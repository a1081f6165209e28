use serde::{Deserialize, Serialize};

use super::frame::{IndicatorFrame, EMA_FAST, EMA_SLOW, MACD_LINE, MACD_SIGNAL};
use super::moving_average::calculate_ema_series;
use crate::models::CandleSeries;

/// EMA windows for the MACD indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdParams {
    pub short_period: usize,
    pub long_period: usize,
    pub signal_period: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            short_period: 12,
            long_period: 26,
            signal_period: 9,
        }
    }
}

/// Append `ema_fast`, `ema_slow`, `macd_line` and `macd_signal` to `frame`
///
/// MACD line is the short EMA of the closes minus the long EMA; the signal line
/// is an EMA of the MACD line itself.
pub fn add_macd(frame: &mut IndicatorFrame, params: &MacdParams) {
    let closes = &frame.base().close;

    let ema_fast = calculate_ema_series(closes, params.short_period);
    let ema_slow = calculate_ema_series(closes, params.long_period);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let macd_signal = calculate_ema_series(&macd_line, params.signal_period);

    frame.insert_column(EMA_FAST, ema_fast.into_iter().map(Some).collect());
    frame.insert_column(EMA_SLOW, ema_slow.into_iter().map(Some).collect());
    frame.insert_column(MACD_LINE, macd_line.into_iter().map(Some).collect());
    frame.insert_column(MACD_SIGNAL, macd_signal.into_iter().map(Some).collect());
}

/// Calculate Moving Average Convergence Divergence (MACD) over a candle series
pub fn macd_indicator(series: &CandleSeries, params: &MacdParams) -> IndicatorFrame {
    let mut frame = IndicatorFrame::from_series(series);
    add_macd(&mut frame, params);
    frame
}

/// MACD line minus signal line, oldest first
///
/// Returns `None` when the frame carries no MACD columns.
pub fn macd_histogram(frame: &IndicatorFrame) -> Option<Vec<f64>> {
    let line = frame.column(MACD_LINE)?;
    let signal = frame.column(MACD_SIGNAL)?;

    Some(
        line.iter()
            .zip(signal)
            .filter_map(|(l, s)| Some((*l)? - (*s)?))
            .collect(),
    )
}
