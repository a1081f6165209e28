use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The exchange call budget is below the configured floor; nothing was sent
    #[error("API quota exhausted: {remaining} calls remaining, floor is {floor}")]
    QuotaExhausted { remaining: u32, floor: u32 },

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Order for {symbol} rejected: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("Exchange transport error: {0}")]
    Transport(#[from] ApiError),
}

impl GatewayError {
    /// Turn an API failure on an order into a rejection when the exchange answered
    pub(crate) fn from_order(symbol: &str, error: ApiError) -> Self {
        match error {
            ApiError::Exchange { code, message } => GatewayError::OrderRejected {
                symbol: symbol.to_string(),
                reason: format!("{} (code {})", message, code),
            },
            other => GatewayError::Transport(other),
        }
    }
}
