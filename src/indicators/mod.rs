// Technical indicators module
// Implements MACD, RSI and MFI over candle series

pub mod frame;
pub mod macd;
pub mod mfi;
pub mod moving_average;
pub mod rsi;

pub use frame::IndicatorFrame;
pub use macd::{add_macd, macd_histogram, macd_indicator, MacdParams};
pub use mfi::{add_mfi, calculate_mfi_series, mfi_indicator};
pub use moving_average::{calculate_ema_series, ewm_mean};
pub use rsi::{add_rsi, calculate_rsi_series, rsi_indicator};
