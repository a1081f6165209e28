pub mod candles;
pub mod timeframe;

pub use candles::{Bar, BarOrder, CandleFrame, CandleSeries};
pub use timeframe::{Resolution, Span};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
            Signal::Sell => "SELL",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Filled market order as reported by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderFill {
    pub symbol: String,
    pub side: OrderSide,
    /// Coins bought or sold
    pub filled_amount: f64,
    /// Quote currency paid or received
    pub filled_amount_quote: f64,
    pub fee_paid: f64,
    pub fee_currency: String,
}

impl OrderFill {
    /// Average fill rate in quote currency per coin
    pub fn rate(&self) -> f64 {
        if self.filled_amount > 0.0 {
            self.filled_amount_quote / self.filled_amount
        } else {
            0.0
        }
    }
}

/// Owned symbol valued at the current market price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    pub value: f64,
    pub change_24h_pct: f64,
}

/// Account-wide aggregates in quote currency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountOverview {
    pub available_funds: f64,
    pub wallet_balance: f64,
    pub total_deposited: f64,
    pub total_withdrawn: f64,
    pub net_gains: f64,
}
