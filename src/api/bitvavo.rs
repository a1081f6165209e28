use async_trait::async_trait;
use chrono::Utc;
use governor::{Quota, RateLimiter};
use reqwest::{header::CONTENT_TYPE, Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    ApiError, BalanceEntry, ExchangeApi, Market, OpenOrder, OrderRequest, OrderResponse,
    Ticker24h, TickerPrice, Transfer,
};
use crate::models::{Bar, Resolution};

const BITVAVO_API_BASE: &str = "https://api.bitvavo.com/v2";
/// Path prefix included in the signed payload
const SIGNATURE_PATH_PREFIX: &str = "/v2";
const RATE_LIMIT_HEADER: &str = "bitvavo-ratelimit-remaining";
/// Weight budget Bitvavo grants per minute before any response has been seen
const INITIAL_RATE_LIMIT: u32 = 1000;
const MAX_RETRIES: u32 = 3;

type BitvavoRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Bitvavo client configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BitvavoConfig {
    pub rest_url: String,
    /// API key (optional for public endpoints)
    pub api_key: String,
    pub api_secret: String,
    /// Milliseconds a signed request stays valid
    pub access_window_ms: u64,
    /// Local pacing, independent of the exchange's own quota
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    /// Transport retries stop once the reported quota drops below this
    pub retry_quota_floor: u32,
}

impl Default for BitvavoConfig {
    fn default() -> Self {
        Self {
            rest_url: BITVAVO_API_BASE.to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            access_window_ms: 10_000,
            requests_per_minute: 600,
            timeout_secs: 30,
            retry_quota_floor: 100,
        }
    }
}

// Keeps the secret out of logs
impl std::fmt::Debug for BitvavoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitvavoConfig")
            .field("rest_url", &self.rest_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("access_window_ms", &self.access_window_ms)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_quota_floor", &self.retry_quota_floor)
            .finish()
    }
}

/// Bitvavo REST v2 client with request signing and rate limiting
///
/// This struct is cloneable to allow sharing across async tasks.
/// All clones share the same rate limiter and remaining-quota counter.
#[derive(Clone)]
pub struct BitvavoClient {
    client: Client,
    config: BitvavoConfig,
    rate_limiter: Arc<BitvavoRateLimiter>,
    remaining: Arc<AtomicU32>,
}

// ============== Wire Types ==============

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

fn parse_number<E: serde::de::Error>(value: NumberOrString) -> Result<Option<f64>, E> {
    match value {
        NumberOrString::Number(n) => Ok(Some(n)),
        NumberOrString::String(s) if s.is_empty() => Ok(None),
        NumberOrString::String(s) => s.parse().map(Some).map_err(E::custom),
    }
}

/// Bitvavo sends decimals as strings
fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    parse_number(NumberOrString::deserialize(deserializer)?)?
        .ok_or_else(|| serde::de::Error::custom("empty number"))
}

fn optional_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => parse_number(value),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(rename = "errorCode")]
    error_code: i64,
    error: String,
}

#[derive(Debug, Deserialize)]
struct RawTime {
    time: i64,
}

#[derive(Debug, Deserialize)]
struct RawMarket {
    market: String,
    base: String,
    quote: String,
}

#[derive(Debug, Deserialize)]
struct RawTickerPrice {
    market: String,
    #[serde(deserialize_with = "number")]
    price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker24h {
    market: String,
    #[serde(default, deserialize_with = "optional_number")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    last: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    volume: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    volume_quote: Option<f64>,
}

/// `[timestamp, open, high, low, close, volume]`
#[derive(Debug, Deserialize)]
struct RawCandle(
    i64,
    #[serde(deserialize_with = "number")] f64,
    #[serde(deserialize_with = "number")] f64,
    #[serde(deserialize_with = "number")] f64,
    #[serde(deserialize_with = "number")] f64,
    #[serde(deserialize_with = "number")] f64,
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalance {
    symbol: String,
    #[serde(deserialize_with = "number")]
    available: f64,
    #[serde(default, deserialize_with = "optional_number")]
    in_order: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawOpenOrder {
    market: String,
    #[serde(default, deserialize_with = "optional_number")]
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTransfer {
    symbol: String,
    #[serde(deserialize_with = "number")]
    amount: f64,
    #[serde(default, deserialize_with = "optional_number")]
    fee: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    order_id: String,
    market: String,
    #[serde(default, deserialize_with = "optional_number")]
    filled_amount: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    filled_amount_quote: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    fee_paid: Option<f64>,
    #[serde(default)]
    fee_currency: String,
}

impl From<RawMarket> for Market {
    fn from(raw: RawMarket) -> Self {
        Self {
            market: raw.market,
            base: raw.base,
            quote: raw.quote,
        }
    }
}

impl From<RawTickerPrice> for TickerPrice {
    fn from(raw: RawTickerPrice) -> Self {
        Self {
            market: raw.market,
            price: raw.price,
        }
    }
}

impl From<RawTicker24h> for Ticker24h {
    fn from(raw: RawTicker24h) -> Self {
        Self {
            market: raw.market,
            open: raw.open,
            last: raw.last,
            volume: raw.volume,
            volume_quote: raw.volume_quote,
        }
    }
}

impl From<RawCandle> for Bar {
    fn from(raw: RawCandle) -> Self {
        let RawCandle(open_time, open, high, low, close, volume) = raw;
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl From<RawBalance> for BalanceEntry {
    fn from(raw: RawBalance) -> Self {
        Self {
            symbol: raw.symbol,
            available: raw.available,
            in_order: raw.in_order.unwrap_or(0.0),
        }
    }
}

impl From<RawOpenOrder> for OpenOrder {
    fn from(raw: RawOpenOrder) -> Self {
        Self {
            market: raw.market,
            amount: raw.amount.unwrap_or(0.0),
        }
    }
}

impl From<RawTransfer> for Transfer {
    fn from(raw: RawTransfer) -> Self {
        Self {
            symbol: raw.symbol,
            amount: raw.amount,
            fee: raw.fee.unwrap_or(0.0),
        }
    }
}

impl From<RawOrder> for OrderResponse {
    fn from(raw: RawOrder) -> Self {
        Self {
            order_id: raw.order_id,
            market: raw.market,
            filled_amount: raw.filled_amount.unwrap_or(0.0),
            filled_amount_quote: raw.filled_amount_quote.unwrap_or(0.0),
            fee_paid: raw.fee_paid.unwrap_or(0.0),
            fee_currency: raw.fee_currency,
        }
    }
}

impl BitvavoClient {
    pub fn new(config: BitvavoConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            config,
            rate_limiter,
            remaining: Arc::new(AtomicU32::new(INITIAL_RATE_LIMIT)),
        })
    }

    fn has_credentials(&self) -> bool {
        !self.config.api_key.is_empty() && !self.config.api_secret.is_empty()
    }

    /// Hex HMAC-SHA256 over `timestamp + method + /v2 + endpoint + body`
    fn sign(&self, timestamp: i64, method: &Method, endpoint: &str, body: &str) -> Option<String> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let payload = format!(
            "{}{}{}{}{}",
            timestamp,
            method.as_str(),
            SIGNATURE_PATH_PREFIX,
            endpoint,
            body
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.api_secret.as_bytes()).ok()?;
        mac.update(payload.as_bytes());

        Some(hex::encode(mac.finalize().into_bytes()))
    }

    fn record_rate_limit(&self, response: &Response) {
        let remaining = response
            .headers()
            .get(RATE_LIMIT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u32>().ok());

        if let Some(remaining) = remaining {
            self.remaining.store(remaining, Ordering::Relaxed);
        }
    }

    /// Single signed round trip, no retries
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
    ) -> Result<Response, reqwest::Error> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.rest_url, endpoint);
        let mut request = self.client.request(method.clone(), &url);

        if self.has_credentials() {
            let timestamp = Utc::now().timestamp_millis();
            let payload = body.as_deref().unwrap_or("");
            if let Some(signature) = self.sign(timestamp, &method, endpoint, payload) {
                request = request
                    .header("Bitvavo-Access-Key", &self.config.api_key)
                    .header("Bitvavo-Access-Signature", signature)
                    .header("Bitvavo-Access-Timestamp", timestamp.to_string())
                    .header("Bitvavo-Access-Window", self.config.access_window_ms.to_string());
            }
        }

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        self.record_rate_limit(&response);
        Ok(response)
    }

    async fn error_from_response(response: Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match serde_json::from_str::<RawError>(&body) {
            Ok(raw) => ApiError::Exchange {
                code: raw.error_code,
                message: raw.error,
            },
            Err(_) => ApiError::Http { status, body },
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Retries are only spent while the exchange still reports enough quota
    fn can_retry(&self) -> bool {
        self.remaining_limit() >= self.config.retry_quota_floor
    }

    /// GET with retry on server errors and network failures
    ///
    /// A 429 means the exchange quota is spent and is returned at once, as is
    /// any failure seen while the remaining quota sits below the retry floor.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let mut attempt = 1;

        loop {
            let error = match self.send(Method::GET, endpoint, None).await {
                Ok(response) if response.status().is_success() => {
                    return Self::decode(response).await;
                }
                Ok(response) if response.status().is_server_error() => {
                    Self::error_from_response(response).await
                }
                Ok(response) => return Err(Self::error_from_response(response).await),
                Err(e) => ApiError::Request(e),
            };

            if attempt >= MAX_RETRIES {
                return Err(error);
            }
            if !self.can_retry() {
                tracing::warn!(
                    "Not retrying {}: {} requests left, floor {}",
                    endpoint,
                    self.remaining_limit(),
                    self.config.retry_quota_floor
                );
                return Err(error);
            }

            let backoff_secs = 2u64.pow(attempt);
            tracing::warn!(
                "{} for {}, retrying in {}s (attempt {}/{})",
                error,
                endpoint,
                backoff_secs,
                attempt,
                MAX_RETRIES
            );
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            attempt += 1;
        }
    }

    /// POST is never retried: a lost response may still have placed the order
    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .send(Method::POST, endpoint, Some(body.to_string()))
            .await?;

        if response.status().is_success() {
            Self::decode(response).await
        } else {
            Err(Self::error_from_response(response).await)
        }
    }
}

fn order_body(order: &OrderRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "market": order.market,
        "side": order.side.as_str(),
        "orderType": "market",
    });

    if let Some(amount) = order.amount {
        body["amount"] = serde_json::Value::String(amount.to_string());
    }
    if let Some(amount_quote) = order.amount_quote {
        body["amountQuote"] = serde_json::Value::String(amount_quote.to_string());
    }

    body
}

#[async_trait]
impl ExchangeApi for BitvavoClient {
    fn remaining_limit(&self) -> u32 {
        self.remaining.load(Ordering::Relaxed)
    }

    async fn server_time(&self) -> Result<i64, ApiError> {
        let raw: RawTime = self.get("/time").await?;
        Ok(raw.time)
    }

    async fn markets(&self) -> Result<Vec<Market>, ApiError> {
        let raw: Vec<RawMarket> = self.get("/markets").await?;
        Ok(raw.into_iter().map(Market::from).collect())
    }

    async fn ticker_price(&self, market: &str) -> Result<TickerPrice, ApiError> {
        let raw: RawTickerPrice = self
            .get(&format!("/ticker/price?market={}", market))
            .await?;
        Ok(raw.into())
    }

    async fn ticker_prices(&self) -> Result<Vec<TickerPrice>, ApiError> {
        let raw: Vec<RawTickerPrice> = self.get("/ticker/price").await?;
        Ok(raw.into_iter().map(TickerPrice::from).collect())
    }

    async fn ticker_24h(&self, market: &str) -> Result<Ticker24h, ApiError> {
        let raw: RawTicker24h = self.get(&format!("/ticker/24h?market={}", market)).await?;
        Ok(raw.into())
    }

    async fn tickers_24h(&self) -> Result<Vec<Ticker24h>, ApiError> {
        let raw: Vec<RawTicker24h> = self.get("/ticker/24h").await?;
        Ok(raw.into_iter().map(Ticker24h::from).collect())
    }

    async fn candles(
        &self,
        market: &str,
        interval: Resolution,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, ApiError> {
        let endpoint = format!(
            "/{}/candles?interval={}&limit={}&start={}&end={}",
            market,
            interval.as_str(),
            limit,
            start_ms,
            end_ms
        );

        let raw: Vec<RawCandle> = self.get(&endpoint).await?;
        Ok(raw.into_iter().map(Bar::from).collect())
    }

    async fn balance(&self) -> Result<Vec<BalanceEntry>, ApiError> {
        let raw: Vec<RawBalance> = self.get("/balance").await?;
        Ok(raw.into_iter().map(BalanceEntry::from).collect())
    }

    async fn open_orders(&self) -> Result<Vec<OpenOrder>, ApiError> {
        let raw: Vec<RawOpenOrder> = self.get("/ordersOpen").await?;
        Ok(raw.into_iter().map(OpenOrder::from).collect())
    }

    async fn deposit_history(&self) -> Result<Vec<Transfer>, ApiError> {
        let raw: Vec<RawTransfer> = self.get("/depositHistory").await?;
        Ok(raw.into_iter().map(Transfer::from).collect())
    }

    async fn withdrawal_history(&self) -> Result<Vec<Transfer>, ApiError> {
        let raw: Vec<RawTransfer> = self.get("/withdrawalHistory").await?;
        Ok(raw.into_iter().map(Transfer::from).collect())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, ApiError> {
        tracing::debug!(
            "Placing {} market order on {}",
            order.side.as_str(),
            order.market
        );

        let raw: RawOrder = self.post("/order", &order_body(order)).await?;
        Ok(raw.into())
    }
}
