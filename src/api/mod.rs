pub mod bitvavo;

pub use bitvavo::{BitvavoClient, BitvavoConfig};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Bar, OrderSide, Resolution};

/// Failures reported by an exchange API implementation
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or connection error
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status without a recognisable exchange error body
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The exchange answered with an error payload (e.g. insufficient balance)
    #[error("exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============== Exchange Types ==============

#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    /// Market name, e.g. `BTC-EUR`
    pub market: String,
    pub base: String,
    pub quote: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerPrice {
    pub market: String,
    pub price: f64,
}

/// Rolling 24h statistics; fields are `None` when the exchange has no trades
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ticker24h {
    pub market: String,
    pub open: Option<f64>,
    pub last: Option<f64>,
    pub volume: Option<f64>,
    pub volume_quote: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntry {
    pub symbol: String,
    pub available: f64,
    pub in_order: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub market: String,
    pub amount: f64,
}

/// Deposit or withdrawal
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub symbol: String,
    pub amount: f64,
    pub fee: f64,
}

/// Market order; exactly one of `amount` (coins) or `amount_quote` is set
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub market: String,
    pub side: OrderSide,
    pub amount: Option<f64>,
    pub amount_quote: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub order_id: String,
    pub market: String,
    pub filled_amount: f64,
    pub filled_amount_quote: f64,
    pub fee_paid: f64,
    pub fee_currency: String,
}

/// Request/response access to a spot exchange
///
/// Every async method is one remote call and counts against the exchange's
/// call quota. `remaining_limit` is local bookkeeping and never hits the network.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Calls still allowed in the current rate window
    fn remaining_limit(&self) -> u32;

    /// Exchange clock in epoch milliseconds
    async fn server_time(&self) -> Result<i64, ApiError>;

    async fn markets(&self) -> Result<Vec<Market>, ApiError>;

    async fn ticker_price(&self, market: &str) -> Result<TickerPrice, ApiError>;

    async fn ticker_prices(&self) -> Result<Vec<TickerPrice>, ApiError>;

    async fn ticker_24h(&self, market: &str) -> Result<Ticker24h, ApiError>;

    async fn tickers_24h(&self) -> Result<Vec<Ticker24h>, ApiError>;

    /// Bars with open time in `[start_ms, end_ms]`, newest first, at most `limit`
    async fn candles(
        &self,
        market: &str,
        interval: Resolution,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, ApiError>;

    async fn balance(&self) -> Result<Vec<BalanceEntry>, ApiError>;

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, ApiError>;

    async fn deposit_history(&self) -> Result<Vec<Transfer>, ApiError>;

    async fn withdrawal_history(&self) -> Result<Vec<Transfer>, ApiError>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError>;
}
