use super::frame::{IndicatorFrame, RSI};
use super::moving_average::{alpha_from_com, ewm_mean};
use crate::models::CandleSeries;

/// Calculate Relative Strength Index (RSI) for every bar
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Gains and losses are smoothed with centre of mass `period - 1`. The first
/// bar has no change and the next `period - 1` bars are warm-up, so they are
/// `None`, as are bars where both averages are zero. Values are rounded to two
/// decimals.
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let period = period.max(1);
    if prices.is_empty() {
        return Vec::new();
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| (-c).max(0.0)).collect();

    let alpha = alpha_from_com((period - 1) as f64);
    let avg_gains = ewm_mean(&gains, alpha, period);
    let avg_losses = ewm_mean(&losses, alpha, period);

    let mut rsi = Vec::with_capacity(prices.len());
    rsi.push(None);
    rsi.extend(avg_gains.iter().zip(&avg_losses).map(|(gain, loss)| {
        let rs = (*gain)? / (*loss)?;
        let value = 100.0 - 100.0 / (1.0 + rs);
        (!value.is_nan()).then(|| (value * 100.0).round() / 100.0)
    }));

    rsi
}

/// Append an `rsi` column to `frame`
pub fn add_rsi(frame: &mut IndicatorFrame, period: usize) {
    let rsi = calculate_rsi_series(&frame.base().close, period);
    frame.insert_column(RSI, rsi);
}

pub fn rsi_indicator(series: &CandleSeries, period: usize) -> IndicatorFrame {
    let mut frame = IndicatorFrame::from_series(series);
    add_rsi(&mut frame, period);
    frame
}
