use super::frame::{IndicatorFrame, MONEY_FLOW_INDEX};
use crate::models::{CandleFrame, CandleSeries};

/// Stand-in for an all-positive window's negative flow
const ZERO_FLOW_EPSILON: f64 = 1e-5;

/// Calculate the Money Flow Index (MFI) for every bar
///
/// A volume-weighted oscillator between 0 and 100: readings above 80 are
/// usually read as overbought, below 20 as oversold.
///
/// Each bar after the first contributes its whole money flow (typical price x
/// volume) to the positive side if its typical price rose versus the previous
/// bar, otherwise to the negative side. From bar `period` onwards the index is
/// computed over the trailing `period` bars; earlier bars are `None`.
pub fn calculate_mfi_series(candles: &CandleFrame, period: usize) -> Vec<Option<f64>> {
    let n = candles.len();
    let typical: Vec<f64> = (0..n)
        .map(|i| (candles.high[i] + candles.low[i] + candles.close[i]) / 3.0)
        .collect();

    let mut positive = vec![0.0; n];
    let mut negative = vec![0.0; n];
    for i in 1..n {
        let flow = typical[i] * candles.volume[i];
        if typical[i] > typical[i - 1] {
            positive[i] = flow;
        } else {
            negative[i] = flow;
        }
    }

    (0..n)
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let window = i + 1 - period..i + 1;
            let positive_sum: f64 = positive[window.clone()].iter().sum();
            let negative_sum: f64 = negative[window].iter().sum();
            let divisor = if negative_sum == 0.0 {
                ZERO_FLOW_EPSILON
            } else {
                negative_sum
            };
            let ratio = positive_sum / divisor;
            Some(100.0 - 100.0 / (1.0 + ratio))
        })
        .collect()
}

/// Append a `money_flow_index` column to `frame`
pub fn add_mfi(frame: &mut IndicatorFrame, period: usize) {
    let mfi = calculate_mfi_series(frame.base(), period);
    frame.insert_column(MONEY_FLOW_INDEX, mfi);
}

pub fn mfi_indicator(series: &CandleSeries, period: usize) -> IndicatorFrame {
    let mut frame = IndicatorFrame::from_series(series);
    add_mfi(&mut frame, period);
    frame
}
