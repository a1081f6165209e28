// Exchange gateway
// Single quota-guarded entry point between the bot and the exchange API

pub mod error;

pub use error::GatewayError;

use serde::Deserialize;
use std::collections::HashMap;

use crate::api::{BalanceEntry, ExchangeApi, OrderRequest, Ticker24h};
use crate::models::{
    AccountOverview, Bar, BarOrder, CandleSeries, Holding, OrderFill, OrderSide, Resolution, Span,
};

/// Most bars the exchange returns for one candle request
pub const CANDLES_PER_REQUEST: usize = 1000;

/// Progress hook for multi-request candle fetches: `(completed, total)`
pub type FetchProgress<'a> = &'a (dyn Fn(usize, usize) + Sync);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Currency every market is quoted in, also treated as a pseudo-symbol
    pub quote_currency: String,
    /// Guarded operations refuse to run below this many remaining calls
    pub quota_floor: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            quote_currency: "EUR".to_string(),
            quota_floor: 100,
        }
    }
}

/// 24h statistics of one symbol against the quote currency
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketStats {
    pub change_24h_pct: f64,
    pub volume_quote: f64,
}

impl MarketStats {
    fn from_ticker(ticker: &Ticker24h) -> Self {
        Self {
            change_24h_pct: percent_change(ticker),
            volume_quote: ticker.volume_quote.unwrap_or(0.0),
        }
    }
}

/// `(last - open) / open * 100`, neutral when the ticker has no trades
fn percent_change(ticker: &Ticker24h) -> f64 {
    match (ticker.open, ticker.last) {
        (Some(open), Some(last)) if open != 0.0 => (last - open) / open * 100.0,
        _ => 0.0,
    }
}

/// Request windows `(start_ms, end_ms)` covering `span` up to `now_ms`, newest first
///
/// The span start is truncated to whole seconds. The window is split into equal
/// slices so that each holds at most [`CANDLES_PER_REQUEST`] bars.
pub fn candle_windows(now_ms: i64, resolution: Resolution, span: Span) -> Vec<(i64, i64)> {
    let needed = span.bars_at(resolution);
    let requests = needed.div_ceil(CANDLES_PER_REQUEST).max(1) as i64;

    let begin = now_ms;
    let end = (now_ms / 1000 - span.seconds() as i64) * 1000;
    let slice = (begin - end) / requests;

    (0..requests)
        .map(|k| (begin - (k + 1) * slice, begin - k * slice))
        .collect()
}

/// Quota-guarded access to one exchange account
///
/// Every operation that costs an exchange call checks the remaining quota first
/// and fails with [`GatewayError::QuotaExhausted`] without touching the network.
pub struct ExchangeGateway<A: ExchangeApi> {
    api: A,
    settings: GatewaySettings,
    symbols: Vec<String>,
}

impl<A: ExchangeApi> ExchangeGateway<A> {
    /// Load the market list once and keep it for symbol validation
    pub async fn connect(api: A, settings: GatewaySettings) -> Result<Self, GatewayError> {
        let mut gateway = Self {
            api,
            settings,
            symbols: Vec::new(),
        };

        gateway.guard()?;
        let markets = gateway.api.markets().await?;

        let mut symbols: Vec<String> = markets.into_iter().map(|m| m.base).collect();
        symbols.push(gateway.settings.quote_currency.clone());
        symbols.sort();
        symbols.dedup();
        gateway.symbols = symbols;

        tracing::debug!("Loaded {} tradeable symbols", gateway.symbols.len());
        Ok(gateway)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn quote_currency(&self) -> &str {
        &self.settings.quote_currency
    }

    pub fn remaining_quota(&self) -> u32 {
        self.api.remaining_limit()
    }

    fn guard(&self) -> Result<(), GatewayError> {
        let remaining = self.api.remaining_limit();
        if remaining < self.settings.quota_floor {
            return Err(GatewayError::QuotaExhausted {
                remaining,
                floor: self.settings.quota_floor,
            });
        }
        Ok(())
    }

    /// Sorted base symbols of every market plus the quote currency
    pub fn available_symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_available(&self, symbol: &str) -> bool {
        self.symbols.binary_search_by(|s| s.as_str().cmp(symbol)).is_ok()
    }

    fn is_quote(&self, symbol: &str) -> bool {
        symbol == self.settings.quote_currency
    }

    fn validate(&self, symbol: &str) -> Result<(), GatewayError> {
        if self.is_available(symbol) {
            Ok(())
        } else {
            Err(GatewayError::UnknownSymbol(symbol.to_string()))
        }
    }

    fn market(&self, symbol: &str) -> String {
        format!("{}-{}", symbol, self.settings.quote_currency)
    }

    /// Base symbol of a market quoted in our currency
    fn base_of<'m>(&self, market: &'m str) -> Option<&'m str> {
        market
            .strip_suffix(self.settings.quote_currency.as_str())
            .and_then(|rest| rest.strip_suffix('-'))
    }

    async fn balances(&self) -> Result<Vec<BalanceEntry>, GatewayError> {
        self.guard()?;
        Ok(self.api.balance().await?)
    }

    /// All current prices keyed by base symbol, one call
    async fn price_book(&self) -> Result<HashMap<String, f64>, GatewayError> {
        self.guard()?;
        let tickers = self.api.ticker_prices().await?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| self.base_of(&t.market).map(|base| (base.to_string(), t.price)))
            .collect())
    }

    fn priced(&self, book: &HashMap<String, f64>, symbol: &str) -> Result<f64, GatewayError> {
        if self.is_quote(symbol) {
            return Ok(1.0);
        }
        book.get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.to_string()))
    }

    // ============== Prices & Balances ==============

    pub async fn symbol_price(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.validate(symbol)?;
        if self.is_quote(symbol) {
            return Ok(1.0);
        }

        self.guard()?;
        let ticker = self.api.ticker_price(&self.market(symbol)).await?;
        Ok(ticker.price)
    }

    /// Prices in input order from a single ticker call
    pub async fn symbol_prices(&self, symbols: &[&str]) -> Result<Vec<f64>, GatewayError> {
        for symbol in symbols {
            self.validate(symbol)?;
        }
        if symbols.iter().all(|s| self.is_quote(s)) {
            return Ok(vec![1.0; symbols.len()]);
        }

        let book = self.price_book().await?;
        symbols.iter().map(|s| self.priced(&book, s)).collect()
    }

    /// Available (not in order) amount; 0.0 when not held
    pub async fn owned_amount(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.validate(symbol)?;

        let amount = self
            .balances()
            .await?
            .into_iter()
            .find(|b| b.symbol.eq_ignore_ascii_case(symbol))
            .map(|b| b.available)
            .unwrap_or(0.0);

        Ok(amount)
    }

    pub async fn available_funds(&self) -> Result<f64, GatewayError> {
        let quote = self.settings.quote_currency.clone();
        self.owned_amount(&quote).await
    }

    /// Symbols with a non-zero available or in-order balance, quote currency excluded
    pub async fn owned_symbols(&self) -> Result<Vec<String>, GatewayError> {
        let owned = self
            .balances()
            .await?
            .into_iter()
            .filter(|b| !self.is_quote(&b.symbol) && (b.available > 0.0 || b.in_order > 0.0))
            .map(|b| b.symbol)
            .collect();

        Ok(owned)
    }

    // ============== Account Aggregates ==============

    /// Quote balance plus held coins and open orders at current prices
    pub async fn total_wallet_balance(&self) -> Result<f64, GatewayError> {
        let balances = self.balances().await?;

        self.guard()?;
        let orders = self.api.open_orders().await?;

        let book = self.price_book().await?;

        let mut total = 0.0;
        for balance in &balances {
            if self.is_quote(&balance.symbol) {
                total += balance.available;
            } else if balance.available > 0.0 {
                total += balance.available * self.priced(&book, &balance.symbol)?;
            }
        }

        for order in &orders {
            let base = self.base_of(&order.market).unwrap_or(order.market.as_str());
            total += order.amount * self.priced(&book, base)?;
        }

        Ok(total)
    }

    pub async fn total_deposited(&self) -> Result<f64, GatewayError> {
        self.guard()?;
        let deposits = self.api.deposit_history().await?;
        Ok(deposits.iter().map(|d| d.amount - d.fee).sum())
    }

    pub async fn total_withdrawn(&self) -> Result<f64, GatewayError> {
        self.guard()?;
        let withdrawals = self.api.withdrawal_history().await?;
        Ok(withdrawals.iter().map(|w| w.amount - w.fee).sum())
    }

    pub async fn total_net_gains(&self) -> Result<f64, GatewayError> {
        let wallet = self.total_wallet_balance().await?;
        let withdrawn = self.total_withdrawn().await?;
        let deposited = self.total_deposited().await?;
        Ok(wallet + withdrawn - deposited)
    }

    // ============== Market Statistics ==============

    pub async fn symbol_24h_change(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.validate(symbol)?;
        if self.is_quote(symbol) {
            return Ok(0.0);
        }

        self.guard()?;
        let ticker = self.api.ticker_24h(&self.market(symbol)).await?;
        Ok(percent_change(&ticker))
    }

    /// 24h volume in the quote currency
    pub async fn symbol_24h_volume(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.validate(symbol)?;
        if self.is_quote(symbol) {
            return Ok(0.0);
        }

        self.guard()?;
        let ticker = self.api.ticker_24h(&self.market(symbol)).await?;
        Ok(ticker.volume_quote.unwrap_or(0.0))
    }

    /// Change and volume of every quoted market from one call, keyed by base symbol
    pub async fn ticker_24h_snapshot(&self) -> Result<HashMap<String, MarketStats>, GatewayError> {
        self.guard()?;
        let tickers = self.api.tickers_24h().await?;

        Ok(tickers
            .iter()
            .filter_map(|t| {
                self.base_of(&t.market)
                    .map(|base| (base.to_string(), MarketStats::from_ticker(t)))
            })
            .collect())
    }

    // ============== Candles ==============

    /// Historical bars covering `span` up to exchange time, newest first
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        resolution: Resolution,
        span: Span,
        progress: Option<FetchProgress<'_>>,
    ) -> Result<CandleSeries, GatewayError> {
        if self.is_quote(symbol) || !self.is_available(symbol) {
            return Err(GatewayError::InvalidParameter(format!(
                "cannot fetch candles for unknown symbol {}",
                symbol
            )));
        }

        self.guard()?;
        let now_ms = self.api.server_time().await?;

        let windows = candle_windows(now_ms, resolution, span);
        let market = self.market(symbol);
        let mut bars: Vec<Bar> = Vec::with_capacity(span.bars_at(resolution));

        for (completed, (start, end)) in windows.iter().enumerate() {
            self.guard()?;
            let chunk = self
                .api
                .candles(&market, resolution, *start, *end, CANDLES_PER_REQUEST)
                .await?;
            bars.extend(chunk);

            if let Some(report) = progress {
                report(completed + 1, windows.len());
            }
        }

        // Adjacent windows share their boundary bar
        bars.dedup_by_key(|bar| bar.open_time);

        Ok(CandleSeries::new(
            symbol,
            resolution,
            bars,
            BarOrder::NewestFirst,
        ))
    }

    // ============== Orders ==============

    /// Market buy spending `quote_amount` of the quote currency
    pub async fn buy(&self, symbol: &str, quote_amount: f64) -> Result<OrderFill, GatewayError> {
        self.place(symbol, OrderSide::Buy, quote_amount).await
    }

    /// Market sell of `amount` coins
    pub async fn sell(&self, symbol: &str, amount: f64) -> Result<OrderFill, GatewayError> {
        self.place(symbol, OrderSide::Sell, amount).await
    }

    async fn place(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
    ) -> Result<OrderFill, GatewayError> {
        if self.is_quote(symbol) {
            return Err(GatewayError::InvalidParameter(format!(
                "cannot trade the quote currency {}",
                symbol
            )));
        }
        self.validate(symbol)?;
        if !(amount.is_finite() && amount > 0.0) {
            return Err(GatewayError::InvalidParameter(format!(
                "order amount for {} must be positive, got {}",
                symbol, amount
            )));
        }

        let request = OrderRequest {
            market: self.market(symbol),
            side,
            amount: (side == OrderSide::Sell).then_some(amount),
            amount_quote: (side == OrderSide::Buy).then_some(amount),
        };

        self.guard()?;
        let response = self
            .api
            .place_order(&request)
            .await
            .map_err(|e| GatewayError::from_order(symbol, e))?;

        Ok(OrderFill {
            symbol: symbol.to_string(),
            side,
            filled_amount: response.filled_amount,
            filled_amount_quote: response.filled_amount_quote,
            fee_paid: response.fee_paid,
            fee_currency: response.fee_currency,
        })
    }

    /// Sell the full available amount of every owned symbol
    ///
    /// Each symbol is attempted regardless of earlier failures. Symbols whose
    /// whole balance is reserved by open orders are skipped and not reported.
    pub async fn liquidate_all(
        &self,
    ) -> Result<Vec<(String, Result<OrderFill, GatewayError>)>, GatewayError> {
        let owned = self.owned_symbols().await?;
        let mut outcomes = Vec::with_capacity(owned.len());

        for symbol in owned {
            let outcome = match self.owned_amount(&symbol).await {
                Ok(amount) if amount <= 0.0 => {
                    tracing::info!(
                        "Nothing available to sell for {}, all in open orders",
                        symbol
                    );
                    continue;
                }
                Ok(amount) => self.sell(&symbol, amount).await,
                Err(e) => Err(e),
            };

            match &outcome {
                Ok(fill) => tracing::info!(
                    "Liquidated {} {} for {:.2} {}",
                    fill.filled_amount,
                    symbol,
                    fill.filled_amount_quote,
                    self.settings.quote_currency
                ),
                Err(e) => tracing::error!("Failed to liquidate {}: {}", symbol, e),
            }

            outcomes.push((symbol, outcome));
        }

        Ok(outcomes)
    }

    // ============== Presentation ==============

    /// Owned symbols with their current price, amount, value and 24h change
    pub async fn holdings(&self) -> Result<Vec<Holding>, GatewayError> {
        let balances = self.balances().await?;
        let book = self.price_book().await?;
        let stats = self.ticker_24h_snapshot().await?;

        let mut holdings = Vec::new();
        for balance in balances {
            if self.is_quote(&balance.symbol) || balance.available <= 0.0 {
                continue;
            }

            let price = self.priced(&book, &balance.symbol)?;
            holdings.push(Holding {
                price,
                amount: balance.available,
                value: price * balance.available,
                change_24h_pct: stats
                    .get(&balance.symbol)
                    .map(|s| s.change_24h_pct)
                    .unwrap_or(0.0),
                symbol: balance.symbol,
            });
        }

        holdings.sort_by(|a, b| b.value.total_cmp(&a.value));
        Ok(holdings)
    }

    pub async fn overview(&self) -> Result<AccountOverview, GatewayError> {
        let available_funds = self.available_funds().await?;
        let wallet_balance = self.total_wallet_balance().await?;
        let total_deposited = self.total_deposited().await?;
        let total_withdrawn = self.total_withdrawn().await?;

        Ok(AccountOverview {
            available_funds,
            wallet_balance,
            total_deposited,
            total_withdrawn,
            net_gains: wallet_balance + total_withdrawn - total_deposited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW_MS: i64 = 1_700_000_000_123;

    #[test]
    fn test_single_window_for_small_fetch() {
        let windows = candle_windows(NOW_MS, Resolution::EightHours, Span::OneMonth);

        assert_eq!(windows.len(), 1);
        let (start, end) = windows[0];
        assert_eq!(end, NOW_MS);
        // Start is truncated to whole seconds
        assert_eq!(start, (NOW_MS / 1000 - 30 * 86_400) * 1000);
    }

    #[test]
    fn test_hourly_month_fits_one_request() {
        assert_eq!(
            candle_windows(NOW_MS, Resolution::OneHour, Span::OneMonth).len(),
            1
        );
    }

    #[test]
    fn test_large_fetch_walks_backward_in_equal_slices() {
        let windows = candle_windows(NOW_MS, Resolution::OneMinute, Span::OneDay);

        assert_eq!(windows.len(), 2);
        let (start0, end0) = windows[0];
        let (start1, end1) = windows[1];

        assert_eq!(end0, NOW_MS);
        assert_eq!(end1, start0);
        assert_eq!(end0 - start0, end1 - start1);
        assert!(start1 < start0);
    }

    #[test]
    fn test_percent_change() {
        let ticker = Ticker24h {
            market: "BTC-EUR".to_string(),
            open: Some(100.0),
            last: Some(110.0),
            ..Default::default()
        };
        assert!((percent_change(&ticker) - 10.0).abs() < 1e-9);

        let empty = Ticker24h {
            market: "NEW-EUR".to_string(),
            ..Default::default()
        };
        assert_eq!(percent_change(&empty), 0.0);
    }

    #[test]
    fn test_default_settings() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.quote_currency, "EUR");
        assert_eq!(settings.quota_floor, 100);
    }
}
