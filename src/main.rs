use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coinbot::api::{BitvavoClient, BitvavoConfig};
use coinbot::config::Settings;
use coinbot::execution::TradingBot;
use coinbot::gateway::ExchangeGateway;
use coinbot::indicators::{add_mfi, add_rsi, frame, IndicatorFrame};
use coinbot::models::{Resolution, Span};
use coinbot::strategy::{MacdStrategy, Strategy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const INDICATOR_PERIOD: usize = 14;

#[derive(Parser)]
#[command(author, version, about = "Stateless MACD trading bot for Bitvavo")]
struct Cli {
    /// Path to a TOML config file (defaults to ./coinbot.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop until interrupted
    Run,

    /// Show funds, wallet balance, deposits, withdrawals and net gains
    Overview,

    /// List owned symbols with price, amount, value and 24h change
    Holdings,

    /// Fetch candles for a symbol and print the latest indicator rows
    Candles {
        symbol: String,

        /// Bar width: 1m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d
        #[arg(short, long, default_value = "8h")]
        resolution: Resolution,

        /// Lookback: 1h .. 1d, 1w, 2w, 1m, 2m, 4m, 6m, 1y, 2y, 5y
        #[arg(short, long, default_value = "1m")]
        span: Span,

        /// Number of most recent rows to print
        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,
    },

    /// Sell every owned symbol at market price
    Liquidate {
        /// Confirm the emergency sell-all
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    setup_logging(&settings.logging.filter);

    let exchange = BitvavoConfig {
        retry_quota_floor: settings.gateway.quota_floor,
        ..settings.exchange.clone()
    };
    let client = BitvavoClient::new(exchange)
        .context("Failed to build Bitvavo client")?;
    let gateway = ExchangeGateway::connect(client, settings.gateway.clone())
        .await
        .context("Failed to load markets")?;

    match cli.command {
        Commands::Run => run(gateway, &settings).await,
        Commands::Overview => overview(&gateway).await,
        Commands::Holdings => holdings(&gateway).await,
        Commands::Candles {
            symbol,
            resolution,
            span,
            rows,
        } => candles(&gateway, &settings, &symbol, resolution, span, rows).await,
        Commands::Liquidate { yes } => liquidate(&gateway, yes).await,
    }
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(gateway: ExchangeGateway<BitvavoClient>, settings: &Settings) -> Result<()> {
    tracing::info!("🚀 coinbot starting in LIVE mode");

    let strategy = MacdStrategy::new(settings.trading.macd);
    let bot = TradingBot::new(gateway, strategy, settings.trading.clone());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        _ = bot.run() => {}
    }

    tracing::info!("👋 coinbot stopped");
    Ok(())
}

async fn overview(gateway: &ExchangeGateway<BitvavoClient>) -> Result<()> {
    let quote = gateway.quote_currency();
    let overview = gateway.overview().await?;

    println!("Available funds:  {:>12.2} {}", overview.available_funds, quote);
    println!("Wallet balance:   {:>12.2} {}", overview.wallet_balance, quote);
    println!("Total deposited:  {:>12.2} {}", overview.total_deposited, quote);
    println!("Total withdrawn:  {:>12.2} {}", overview.total_withdrawn, quote);
    println!("Net gains:        {:>12.2} {}", overview.net_gains, quote);

    Ok(())
}

async fn holdings(gateway: &ExchangeGateway<BitvavoClient>) -> Result<()> {
    let holdings = gateway.holdings().await?;
    if holdings.is_empty() {
        println!("No open positions");
        return Ok(());
    }

    println!(
        "{:<8} {:>14} {:>16} {:>12} {:>9}",
        "SYMBOL", "PRICE", "AMOUNT", "VALUE", "24H"
    );
    for h in &holdings {
        println!(
            "{:<8} {:>14.4} {:>16.6} {:>12.2} {:>8.2}%",
            h.symbol, h.price, h.amount, h.value, h.change_24h_pct
        );
    }

    Ok(())
}

async fn candles(
    gateway: &ExchangeGateway<BitvavoClient>,
    settings: &Settings,
    symbol: &str,
    resolution: Resolution,
    span: Span,
    rows: usize,
) -> Result<()> {
    let progress = |done: usize, total: usize| {
        tracing::info!("Loading historical {} candles: {}/{}", symbol, done, total);
    };

    let series = gateway
        .fetch_candles(symbol, resolution, span, Some(&progress))
        .await?;
    tracing::info!(
        "Fetched {} {} candles covering {:.2} days",
        series.len(),
        resolution,
        series.timespan_in_days()
    );

    let strategy = MacdStrategy::new(settings.trading.macd);
    let mut indicators = strategy.analyze(&series);
    add_rsi(&mut indicators, INDICATOR_PERIOD);
    add_mfi(&mut indicators, INDICATOR_PERIOD);

    print_rows(&indicators, rows);

    match strategy.evaluate(&indicators) {
        Ok(signal) => println!("\n{} signal: {}", strategy.name(), signal),
        Err(e) => println!("\n{} signal unavailable: {}", strategy.name(), e),
    }

    Ok(())
}

fn print_rows(indicators: &IndicatorFrame, rows: usize) {
    let columns = [
        frame::MACD_LINE,
        frame::MACD_SIGNAL,
        frame::RSI,
        frame::MONEY_FLOW_INDEX,
    ];
    let base = indicators.base();
    let start = base.len().saturating_sub(rows);

    print!("{:<20} {:>14}", "OPEN TIME", "CLOSE");
    for name in columns {
        print!(" {:>16}", name);
    }
    println!();

    for row in start..base.len() {
        let time = chrono::DateTime::from_timestamp_millis(base.timestamp[row])
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        print!("{:<20} {:>14.4}", time, base.close[row]);

        for name in columns {
            match indicators.column(name).and_then(|c| c[row]) {
                Some(value) => print!(" {:>16.4}", value),
                None => print!(" {:>16}", "-"),
            }
        }
        println!();
    }
}

async fn liquidate(gateway: &ExchangeGateway<BitvavoClient>, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to sell everything without --yes");
    }

    tracing::warn!("💥 Liquidating all positions");
    let outcomes = gateway.liquidate_all().await?;
    let failures = outcomes.iter().filter(|(_, r)| r.is_err()).count();

    tracing::info!(
        "Liquidation finished: {} sold, {} failed",
        outcomes.len() - failures,
        failures
    );

    if failures > 0 {
        anyhow::bail!("{} symbols could not be sold", failures);
    }
    Ok(())
}
