// In-memory exchange used by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use coinbot::api::{
    ApiError, BalanceEntry, ExchangeApi, Market, OpenOrder, OrderRequest, OrderResponse,
    Ticker24h, TickerPrice, Transfer,
};
use coinbot::models::{Bar, OrderSide, Resolution};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Exchange clock, on a whole second
pub const NOW_MS: i64 = 1_700_000_000_000;
pub const HOUR_MS: i64 = 3_600_000;

pub struct MockExchange {
    remaining: AtomicU32,
    calls: AtomicUsize,
    markets: Vec<Market>,
    prices: HashMap<String, f64>,
    tickers: HashMap<String, Ticker24h>,
    candles: HashMap<String, Vec<Bar>>,
    balances: Mutex<Vec<BalanceEntry>>,
    open_orders: Vec<OpenOrder>,
    deposits: Vec<Transfer>,
    withdrawals: Vec<Transfer>,
    rejecting: HashSet<String>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub candle_requests: Mutex<Vec<(String, i64, i64)>>,
}

impl MockExchange {
    /// Exchange listing `symbols` against EUR
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            remaining: AtomicU32::new(1000),
            calls: AtomicUsize::new(0),
            markets: symbols
                .iter()
                .map(|s| Market {
                    market: format!("{}-EUR", s),
                    base: s.to_string(),
                    quote: "EUR".to_string(),
                })
                .collect(),
            prices: HashMap::new(),
            tickers: HashMap::new(),
            candles: HashMap::new(),
            balances: Mutex::new(Vec::new()),
            open_orders: Vec::new(),
            deposits: Vec::new(),
            withdrawals: Vec::new(),
            rejecting: HashSet::new(),
            orders: Mutex::new(Vec::new()),
            candle_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(format!("{}-EUR", symbol), price);
        self
    }

    pub fn with_ticker(mut self, symbol: &str, open: f64, last: f64, volume_quote: f64) -> Self {
        let market = format!("{}-EUR", symbol);
        self.tickers.insert(
            market.clone(),
            Ticker24h {
                market,
                open: Some(open),
                last: Some(last),
                volume: None,
                volume_quote: Some(volume_quote),
            },
        );
        self
    }

    pub fn with_balance(self, symbol: &str, available: f64, in_order: f64) -> Self {
        self.balances.lock().unwrap().push(BalanceEntry {
            symbol: symbol.to_string(),
            available,
            in_order,
        });
        self
    }

    /// Bars oldest first
    pub fn with_candles(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.candles.insert(format!("{}-EUR", symbol), bars);
        self
    }

    pub fn with_open_order(mut self, market: &str, amount: f64) -> Self {
        self.open_orders.push(OpenOrder {
            market: market.to_string(),
            amount,
        });
        self
    }

    pub fn with_deposit(mut self, amount: f64, fee: f64) -> Self {
        self.deposits.push(transfer(amount, fee));
        self
    }

    pub fn with_withdrawal(mut self, amount: f64, fee: f64) -> Self {
        self.withdrawals.push(transfer(amount, fee));
        self
    }

    /// Orders on this symbol fail with an exchange error
    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.rejecting.insert(format!("{}-EUR", symbol));
        self
    }

    pub fn set_remaining(&self, remaining: u32) {
        self.remaining.store(remaining, Ordering::SeqCst);
    }

    /// Network calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn candle_request_count(&self) -> usize {
        self.candle_requests.lock().unwrap().len()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn price_of(&self, market: &str) -> Result<f64, ApiError> {
        self.prices.get(market).copied().ok_or(ApiError::Exchange {
            code: 205,
            message: format!("market {} not found", market),
        })
    }

    fn adjust_balance(balances: &mut Vec<BalanceEntry>, symbol: &str, delta: f64) {
        match balances.iter_mut().find(|b| b.symbol == symbol) {
            Some(entry) => entry.available += delta,
            None => balances.push(BalanceEntry {
                symbol: symbol.to_string(),
                available: delta,
                in_order: 0.0,
            }),
        }
    }
}

fn transfer(amount: f64, fee: f64) -> Transfer {
    Transfer {
        symbol: "EUR".to_string(),
        amount,
        fee,
    }
}

/// Bars ending one step before `NOW_MS`, oldest first
pub fn bars_until_now(closes: &[f64], step_ms: i64) -> Vec<Bar> {
    let n = closes.len() as i64;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            open_time: NOW_MS - (n - i as i64) * step_ms,
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// 90 eight-hour bars of compounding growth, a BUY under MACD(12, 39, 9)
pub fn rising_bars() -> Vec<Bar> {
    let closes: Vec<f64> = (0..90).map(|i| 100.0 * 1.03f64.powi(i)).collect();
    bars_until_now(&closes, 8 * HOUR_MS)
}

/// 90 eight-hour bars of steady decline, a SELL under MACD(12, 39, 9)
pub fn falling_bars() -> Vec<Bar> {
    let closes: Vec<f64> = (0..90).map(|i| 300.0 - i as f64 * 2.0).collect();
    bars_until_now(&closes, 8 * HOUR_MS)
}

#[async_trait]
impl ExchangeApi for MockExchange {
    fn remaining_limit(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    async fn server_time(&self) -> Result<i64, ApiError> {
        self.hit();
        Ok(NOW_MS)
    }

    async fn markets(&self) -> Result<Vec<Market>, ApiError> {
        self.hit();
        Ok(self.markets.clone())
    }

    async fn ticker_price(&self, market: &str) -> Result<TickerPrice, ApiError> {
        self.hit();
        Ok(TickerPrice {
            market: market.to_string(),
            price: self.price_of(market)?,
        })
    }

    async fn ticker_prices(&self) -> Result<Vec<TickerPrice>, ApiError> {
        self.hit();
        Ok(self
            .prices
            .iter()
            .map(|(market, &price)| TickerPrice {
                market: market.clone(),
                price,
            })
            .collect())
    }

    async fn ticker_24h(&self, market: &str) -> Result<Ticker24h, ApiError> {
        self.hit();
        Ok(self.tickers.get(market).cloned().unwrap_or(Ticker24h {
            market: market.to_string(),
            ..Default::default()
        }))
    }

    async fn tickers_24h(&self) -> Result<Vec<Ticker24h>, ApiError> {
        self.hit();
        Ok(self.tickers.values().cloned().collect())
    }

    async fn candles(
        &self,
        market: &str,
        _interval: Resolution,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, ApiError> {
        self.hit();
        self.candle_requests
            .lock()
            .unwrap()
            .push((market.to_string(), start_ms, end_ms));

        let mut bars: Vec<Bar> = self
            .candles
            .get(market)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.open_time >= start_ms && b.open_time <= end_ms)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        bars.sort_by_key(|b| std::cmp::Reverse(b.open_time));
        bars.truncate(limit);
        Ok(bars)
    }

    async fn balance(&self) -> Result<Vec<BalanceEntry>, ApiError> {
        self.hit();
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, ApiError> {
        self.hit();
        Ok(self.open_orders.clone())
    }

    async fn deposit_history(&self) -> Result<Vec<Transfer>, ApiError> {
        self.hit();
        Ok(self.deposits.clone())
    }

    async fn withdrawal_history(&self) -> Result<Vec<Transfer>, ApiError> {
        self.hit();
        Ok(self.withdrawals.clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
        self.hit();
        self.orders.lock().unwrap().push(order.clone());

        if self.rejecting.contains(&order.market) {
            return Err(ApiError::Exchange {
                code: 216,
                message: "You do not have sufficient balance to complete this operation."
                    .to_string(),
            });
        }

        let price = self.price_of(&order.market)?;
        let base = order.market.trim_end_matches("-EUR").to_string();
        let (coins, quote) = match order.side {
            OrderSide::Buy => {
                let quote = order.amount_quote.unwrap_or(0.0);
                (quote / price, quote)
            }
            OrderSide::Sell => {
                let coins = order.amount.unwrap_or(0.0);
                (coins, coins * price)
            }
        };

        let mut balances = self.balances.lock().unwrap();
        match order.side {
            OrderSide::Buy => {
                Self::adjust_balance(&mut balances, &base, coins);
                Self::adjust_balance(&mut balances, "EUR", -quote);
            }
            OrderSide::Sell => {
                Self::adjust_balance(&mut balances, &base, -coins);
                Self::adjust_balance(&mut balances, "EUR", quote);
            }
        }

        Ok(OrderResponse {
            order_id: format!("order-{}", self.orders.lock().map(|o| o.len()).unwrap_or(0)),
            market: order.market.clone(),
            filled_amount: coins,
            filled_amount_quote: quote,
            fee_paid: quote * 0.0025,
            fee_currency: "EUR".to_string(),
        })
    }
}
