use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

use super::selection::{
    plan_opening, select_best_symbols, FundingRules, OpeningPlan, PromisingSymbol,
};
use crate::api::ExchangeApi;
use crate::gateway::{ExchangeGateway, GatewayError};
use crate::indicators::{IndicatorFrame, MacdParams};
use crate::models::{OrderFill, Resolution, Signal, Span};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    pub target_positions: usize,
    /// Minimum 24h quote volume for a symbol to be considered
    pub volume_floor: f64,
    pub resolution: Resolution,
    /// History fetched for every signal evaluation
    pub lookback: Span,
    pub macd: MacdParams,
    pub min_stake: f64,
    pub reserve_fraction: f64,
    pub interval_minutes: u64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            target_positions: 4,
            volume_floor: 250_000.0,
            resolution: Resolution::EightHours,
            lookback: Span::OneMonth,
            macd: MacdParams {
                short_period: 12,
                long_period: 39,
                signal_period: 9,
            },
            min_stake: 5.1,
            reserve_fraction: 0.025,
            interval_minutes: 120,
        }
    }
}

impl TradingSettings {
    pub fn funding_rules(&self) -> FundingRules {
        FundingRules {
            target_positions: self.target_positions,
            min_stake: self.min_stake,
            reserve_fraction: self.reserve_fraction,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// Bars a complete lookback window must contain
    pub fn expected_bars(&self) -> usize {
        self.lookback.bars_at(self.resolution)
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationReport {
    pub reviewed: usize,
    pub closed: Vec<String>,
    pub opened: Vec<String>,
}

/// Time left to wait after an iteration; zero when it overran
pub fn cooldown(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

fn describe_latest(frame: &IndicatorFrame) -> String {
    frame
        .column_names()
        .filter_map(|name| frame.latest(name).map(|v| format!("{} = {:.2}", name, v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_fill(fill: &OrderFill, quote: &str) -> String {
    format!(
        "{} {} for {:.2} {} at a rate of {:.2} {}/{} (fee: {} {})",
        fill.filled_amount,
        fill.symbol,
        fill.filled_amount_quote,
        quote,
        fill.rate(),
        quote,
        fill.symbol,
        fill.fee_paid,
        fill.fee_currency
    )
}

/// Stateless trading loop
///
/// Holds no position book: every iteration re-reads balances from the
/// exchange, closes positions whose signal turned SELL and fills free slots
/// with the best-ranked BUY candidates.
pub struct TradingBot<A: ExchangeApi, S: Strategy> {
    gateway: ExchangeGateway<A>,
    strategy: S,
    settings: TradingSettings,
}

impl<A: ExchangeApi, S: Strategy> TradingBot<A, S> {
    pub fn new(gateway: ExchangeGateway<A>, strategy: S, settings: TradingSettings) -> Self {
        Self {
            gateway,
            strategy,
            settings,
        }
    }

    pub fn gateway(&self) -> &ExchangeGateway<A> {
        &self.gateway
    }

    pub fn settings(&self) -> &TradingSettings {
        &self.settings
    }

    async fn analyze_symbol(&self, symbol: &str) -> Result<IndicatorFrame, GatewayError> {
        let candles = self
            .gateway
            .fetch_candles(symbol, self.settings.resolution, self.settings.lookback, None)
            .await?;
        Ok(self.strategy.analyze(&candles))
    }

    async fn review_symbol(&self, symbol: &str) -> Result<Option<OrderFill>> {
        let frame = self
            .analyze_symbol(symbol)
            .await
            .with_context(|| format!("fetching candles for {}", symbol))?;
        let signal = self
            .strategy
            .evaluate(&frame)
            .with_context(|| format!("evaluating {}", symbol))?;

        if signal != Signal::Sell {
            tracing::info!(
                "{} kept based on {}: {}",
                symbol,
                self.strategy.name(),
                describe_latest(&frame)
            );
            return Ok(None);
        }

        let amount = self.gateway.owned_amount(symbol).await?;
        if amount <= 0.0 {
            tracing::info!(
                "{} signals SELL but nothing is available, all in open orders",
                symbol
            );
            return Ok(None);
        }
        let fill = self.gateway.sell(symbol, amount).await?;

        tracing::info!(
            "Sold {}",
            describe_fill(&fill, self.gateway.quote_currency())
        );
        tracing::info!(
            "{} dumped based on {}: {}",
            symbol,
            self.strategy.name(),
            describe_latest(&frame)
        );
        Ok(Some(fill))
    }

    /// Sell every owned symbol whose signal is SELL
    ///
    /// Per-symbol failures are logged and do not stop the review.
    pub async fn review_positions(&self) -> Result<(usize, Vec<String>), GatewayError> {
        let owned = self.gateway.owned_symbols().await?;
        let mut closed = Vec::new();

        for symbol in &owned {
            match self.review_symbol(symbol).await {
                Ok(Some(_)) => closed.push(symbol.clone()),
                Ok(None) => {}
                Err(e) => tracing::error!("Failed to review {}: {:#}", symbol, e),
            }
        }

        Ok((owned.len(), closed))
    }

    /// Scan every available symbol for BUY candidates
    ///
    /// 24h statistics come from one ticker snapshot; candles are fetched only
    /// for symbols that pass the growth and volume filters.
    pub async fn find_promising_symbols(&self) -> Result<Vec<PromisingSymbol>, GatewayError> {
        let stats = self.gateway.ticker_24h_snapshot().await?;
        let expected_bars = self.settings.expected_bars();
        let mut promising = Vec::new();

        for symbol in self.gateway.available_symbols() {
            if symbol == self.gateway.quote_currency() {
                continue;
            }

            let market = stats.get(symbol).copied().unwrap_or_default();
            if market.change_24h_pct <= 0.0 {
                tracing::debug!(
                    "{} not promising because 24h growth = {:.2}%",
                    symbol,
                    market.change_24h_pct
                );
                continue;
            }

            if market.volume_quote < self.settings.volume_floor {
                tracing::debug!(
                    "{} not promising because the past 24h volume was {:.0} (<{})",
                    symbol,
                    market.volume_quote,
                    self.settings.volume_floor
                );
                continue;
            }

            let frame = match self.analyze_symbol(symbol).await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", symbol, e);
                    continue;
                }
            };

            if frame.len() != expected_bars {
                tracing::debug!(
                    "{} not promising because {} of {} {} candles were returned",
                    symbol,
                    frame.len(),
                    expected_bars,
                    self.settings.resolution
                );
                continue;
            }

            let signal = match self.strategy.evaluate(&frame) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::debug!("{} not promising: {}", symbol, e);
                    continue;
                }
            };

            if signal != Signal::Buy {
                tracing::debug!("{} not promising because the signal is {}", symbol, signal);
                continue;
            }

            tracing::debug!("{} saved as a promising symbol", symbol);
            promising.push(PromisingSymbol {
                symbol: symbol.clone(),
                growth_24h_pct: market.change_24h_pct,
                volume_24h: market.volume_quote,
                signal,
                strength: self.strategy.strength(&frame),
            });
        }

        Ok(promising)
    }

    /// Fill free position slots with the best candidates
    pub async fn open_new_positions(&self) -> Result<Vec<String>, GatewayError> {
        let open = self.gateway.owned_symbols().await?.len();
        let funds = self.gateway.available_funds().await?;
        let quote = self.gateway.quote_currency();

        let (slots, tradeable, stake) =
            match plan_opening(open, funds, &self.settings.funding_rules()) {
                OpeningPlan::AtTarget { open } => {
                    tracing::info!(
                        "{}/{} open positions. Not considering opening more positions",
                        open,
                        self.settings.target_positions
                    );
                    return Ok(Vec::new());
                }
                OpeningPlan::InsufficientFunds {
                    tradeable,
                    required,
                } => {
                    tracing::warn!(
                        "Only {:.2} {} available for trading, need {:.2} to open {} new positions",
                        tradeable,
                        quote,
                        required,
                        self.settings.target_positions - open
                    );
                    return Ok(Vec::new());
                }
                OpeningPlan::Open {
                    slots,
                    tradeable,
                    stake,
                } => (slots, tradeable, stake),
            };

        tracing::info!(
            "{} open positions. Try to open {} more positions",
            open,
            slots
        );

        let candidates = self.find_promising_symbols().await?;
        let selected = select_best_symbols(candidates, slots);

        for candidate in &selected {
            tracing::debug!(
                "{} selected for trading based on 24h volume {:.0} and 24h gains {:.2}%",
                candidate.symbol,
                candidate.volume_24h,
                candidate.growth_24h_pct
            );
        }
        tracing::info!(
            "{} symbols selected for trade: {:?}",
            selected.len(),
            selected.iter().map(|c| c.symbol.as_str()).collect::<Vec<_>>()
        );
        tracing::info!(
            "{:.2} {} available. Investing {:.2} in each symbol",
            tradeable,
            quote,
            stake
        );

        let mut opened = Vec::new();
        for candidate in selected {
            match self.gateway.buy(&candidate.symbol, stake).await {
                Ok(fill) => {
                    tracing::info!("Bought {}", describe_fill(&fill, quote));
                    opened.push(candidate.symbol);
                }
                Err(e) => tracing::error!("Failed to buy {}: {}", candidate.symbol, e),
            }
        }

        Ok(opened)
    }

    /// Review existing positions, then open new ones
    pub async fn run_iteration(&self) -> IterationReport {
        let mut report = IterationReport::default();

        match self.review_positions().await {
            Ok((reviewed, closed)) => {
                report.reviewed = reviewed;
                report.closed = closed;
            }
            Err(e) => tracing::error!("Position review failed: {}", e),
        }

        match self.open_new_positions().await {
            Ok(opened) => report.opened = opened,
            Err(e) => tracing::error!("Opening new positions failed: {}", e),
        }

        report
    }

    /// Iterate forever at the configured interval
    pub async fn run(&self) {
        tracing::info!(
            "Starting {} trading loop: {} positions, {} candles, every {} min",
            self.strategy.name(),
            self.settings.target_positions,
            self.settings.resolution,
            self.settings.interval_minutes
        );

        loop {
            let started = Instant::now();
            let report = self.run_iteration().await;

            let elapsed = started.elapsed();
            let wait = cooldown(self.settings.interval(), elapsed);
            tracing::info!(
                "Iteration completed in {}s ({} reviewed, {} closed, {} opened). Waiting {}s",
                elapsed.as_secs(),
                report.reviewed,
                report.closed.len(),
                report.opened.len(),
                wait.as_secs()
            );

            tokio::time::sleep(wait).await;
        }
    }
}
