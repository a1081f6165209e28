mod common;

use common::{bars_until_now, rising_bars, MockExchange, NOW_MS};
use coinbot::gateway::{ExchangeGateway, GatewayError, GatewaySettings};
use coinbot::models::{BarOrder, OrderSide, Resolution, Span};
use std::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

async fn connect(exchange: MockExchange) -> ExchangeGateway<MockExchange> {
    ExchangeGateway::connect(exchange, GatewaySettings::default())
        .await
        .expect("mock markets always load")
}

fn listing() -> MockExchange {
    MockExchange::new(&["BTC", "ETH", "SOL", "ETH"])
        .with_price("BTC", 20_000.0)
        .with_price("ETH", 1_000.0)
        .with_price("SOL", 50.0)
}

#[tokio::test]
async fn test_available_symbols_sorted_unique_with_quote() {
    let gateway = connect(listing()).await;

    assert_eq!(gateway.available_symbols(), ["BTC", "ETH", "EUR", "SOL"]);
}

#[tokio::test]
async fn test_quota_guard_below_floor_makes_no_call() {
    let gateway = connect(listing()).await;
    gateway.api().set_remaining(99);
    let before = gateway.api().calls();

    let result = gateway.symbol_price("BTC").await;

    assert!(matches!(
        result,
        Err(GatewayError::QuotaExhausted {
            remaining: 99,
            floor: 100
        })
    ));
    assert_eq!(gateway.api().calls(), before);

    assert_err!(gateway.owned_symbols().await);
    assert_err!(gateway.buy("BTC", 10.0).await);
    assert_err!(gateway.ticker_24h_snapshot().await);
    assert_eq!(gateway.api().calls(), before);
    assert!(gateway.api().placed_orders().is_empty());
}

#[tokio::test]
async fn test_quota_guard_at_floor_proceeds() {
    let gateway = connect(listing()).await;
    gateway.api().set_remaining(100);
    let before = gateway.api().calls();

    let price = assert_ok!(gateway.symbol_price("BTC").await);

    assert_eq!(price, 20_000.0);
    assert_eq!(gateway.api().calls(), before + 1);
}

#[tokio::test]
async fn test_connect_respects_quota() {
    let exchange = listing();
    exchange.set_remaining(10);

    let result = ExchangeGateway::connect(exchange, GatewaySettings::default()).await;
    assert!(matches!(result, Err(GatewayError::QuotaExhausted { .. })));
}

#[tokio::test]
async fn test_quote_currency_price_needs_no_call() {
    let gateway = connect(listing()).await;
    gateway.api().set_remaining(0);
    let before = gateway.api().calls();

    assert_eq!(gateway.symbol_price("EUR").await.unwrap(), 1.0);
    assert_eq!(gateway.api().calls(), before);
}

#[tokio::test]
async fn test_unknown_symbol_is_rejected_without_call() {
    let gateway = connect(listing()).await;
    let before = gateway.api().calls();

    assert!(matches!(
        gateway.symbol_price("NOPE").await,
        Err(GatewayError::UnknownSymbol(s)) if s == "NOPE"
    ));
    assert!(matches!(
        gateway.owned_amount("NOPE").await,
        Err(GatewayError::UnknownSymbol(_))
    ));
    assert_eq!(gateway.api().calls(), before);
}

#[tokio::test]
async fn test_symbol_prices_preserve_order_in_one_call() {
    let gateway = connect(listing()).await;
    let before = gateway.api().calls();

    let prices = gateway.symbol_prices(&["SOL", "EUR", "BTC"]).await.unwrap();

    assert_eq!(prices, vec![50.0, 1.0, 20_000.0]);
    assert_eq!(gateway.api().calls(), before + 1);
}

#[tokio::test]
async fn test_balances_and_owned_symbols() {
    let gateway = connect(
        listing()
            .with_balance("EUR", 150.0, 0.0)
            .with_balance("BTC", 0.5, 0.0)
            .with_balance("ETH", 0.0, 2.0)
            .with_balance("SOL", 0.0, 0.0),
    )
    .await;

    assert_eq!(gateway.owned_amount("BTC").await.unwrap(), 0.5);
    assert_eq!(gateway.owned_amount("SOL").await.unwrap(), 0.0);
    assert_eq!(gateway.available_funds().await.unwrap(), 150.0);
    assert_eq!(gateway.owned_symbols().await.unwrap(), vec!["BTC", "ETH"]);
}

#[tokio::test]
async fn test_account_aggregates() {
    let gateway = connect(
        listing()
            .with_balance("EUR", 100.0, 0.0)
            .with_balance("BTC", 0.5, 0.0)
            .with_open_order("ETH-EUR", 2.0)
            .with_deposit(1_000.0, 0.0)
            .with_deposit(500.0, 5.0)
            .with_withdrawal(200.0, 1.0),
    )
    .await;

    // 100 + 0.5 * 20000 + 2 * 1000
    assert_eq!(gateway.total_wallet_balance().await.unwrap(), 12_100.0);
    assert_eq!(gateway.total_deposited().await.unwrap(), 1_495.0);
    assert_eq!(gateway.total_withdrawn().await.unwrap(), 199.0);
    assert_eq!(gateway.total_net_gains().await.unwrap(), 10_804.0);

    let overview = gateway.overview().await.unwrap();
    assert_eq!(overview.available_funds, 100.0);
    assert_eq!(overview.net_gains, 10_804.0);
}

#[tokio::test]
async fn test_24h_statistics() {
    let gateway = connect(listing().with_ticker("BTC", 100.0, 110.0, 2_500_000.0)).await;

    let change = gateway.symbol_24h_change("BTC").await.unwrap();
    assert!((change - 10.0).abs() < 1e-9);
    assert_eq!(
        gateway.symbol_24h_volume("BTC").await.unwrap(),
        2_500_000.0
    );

    // No trades in the last 24h is neutral, not an error
    assert_eq!(gateway.symbol_24h_change("SOL").await.unwrap(), 0.0);
    assert_eq!(gateway.symbol_24h_volume("SOL").await.unwrap(), 0.0);

    let before = gateway.api().calls();
    assert_eq!(gateway.symbol_24h_change("EUR").await.unwrap(), 0.0);
    assert_eq!(gateway.symbol_24h_volume("EUR").await.unwrap(), 0.0);
    assert_eq!(gateway.api().calls(), before);
}

#[tokio::test]
async fn test_ticker_snapshot_keyed_by_base() {
    let gateway = connect(
        listing()
            .with_ticker("BTC", 100.0, 110.0, 2_500_000.0)
            .with_ticker("ETH", 100.0, 95.0, 800_000.0),
    )
    .await;
    let before = gateway.api().calls();

    let snapshot = gateway.ticker_24h_snapshot().await.unwrap();

    assert_eq!(gateway.api().calls(), before + 1);
    assert!((snapshot["BTC"].change_24h_pct - 10.0).abs() < 1e-9);
    assert!((snapshot["ETH"].change_24h_pct + 5.0).abs() < 1e-9);
    assert_eq!(snapshot["ETH"].volume_quote, 800_000.0);
    assert!(!snapshot.contains_key("SOL"));
}

#[tokio::test]
async fn test_month_of_8h_candles_is_one_request() {
    let gateway = connect(listing().with_candles("BTC", rising_bars())).await;

    let series = gateway
        .fetch_candles("BTC", Resolution::EightHours, Span::OneMonth, None)
        .await
        .unwrap();

    assert_eq!(gateway.api().candle_request_count(), 1);
    assert_eq!(series.len(), 90);
    assert_eq!(series.order(), BarOrder::NewestFirst);
    assert!(series.timestamps()[0] > series.timestamps()[89]);
    assert_eq!(series.symbol(), "BTC");
    assert_eq!(series.resolution(), Resolution::EightHours);
}

#[tokio::test]
async fn test_day_of_minute_candles_walks_back_in_two_requests() {
    // One bar per minute from exactly one day ago up to now inclusive
    let closes: Vec<f64> = (0..1441).map(|i| 100.0 + i as f64 * 0.01).collect();
    let mut bars = bars_until_now(&closes, 60_000);
    for bar in &mut bars {
        bar.open_time += 60_000;
    }
    let gateway = connect(listing().with_candles("ETH", bars)).await;

    let reported = Mutex::new(Vec::new());
    let progress = |done: usize, total: usize| reported.lock().unwrap().push((done, total));

    let series = gateway
        .fetch_candles("ETH", Resolution::OneMinute, Span::OneDay, Some(&progress))
        .await
        .unwrap();

    let requests = gateway.api().candle_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let (_, start0, end0) = requests[0].clone();
    let (_, start1, end1) = requests[1].clone();
    assert_eq!(end0, NOW_MS);
    assert_eq!(end1, start0);
    assert_eq!(end0 - start0, end1 - start1);
    assert_eq!(start1, NOW_MS - 86_400_000);

    // The bar on the shared boundary is kept once
    assert_eq!(series.len(), 1441);
    assert!(series.timestamps().windows(2).all(|w| w[0] > w[1]));

    assert_eq!(*reported.lock().unwrap(), vec![(1, 2), (2, 2)]);
}

#[tokio::test]
async fn test_candles_for_unknown_symbol_are_invalid() {
    let gateway = connect(listing()).await;
    let before = gateway.api().calls();

    assert!(matches!(
        gateway
            .fetch_candles("NOPE", Resolution::OneHour, Span::OneDay, None)
            .await,
        Err(GatewayError::InvalidParameter(_))
    ));
    assert!(matches!(
        gateway
            .fetch_candles("EUR", Resolution::OneHour, Span::OneDay, None)
            .await,
        Err(GatewayError::InvalidParameter(_))
    ));
    assert_eq!(gateway.api().calls(), before);
}

#[tokio::test]
async fn test_buy_and_sell_place_market_orders() {
    let gateway = connect(listing().with_balance("EUR", 100.0, 0.0)).await;

    let bought = gateway.buy("SOL", 25.0).await.unwrap();
    assert_eq!(bought.side, OrderSide::Buy);
    assert_eq!(bought.filled_amount, 0.5);
    assert_eq!(bought.rate(), 50.0);

    let sold = gateway.sell("SOL", 0.5).await.unwrap();
    assert_eq!(sold.filled_amount_quote, 25.0);

    let orders = gateway.api().placed_orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].market, "SOL-EUR");
    assert_eq!(orders[0].amount_quote, Some(25.0));
    assert_eq!(orders[0].amount, None);
    assert_eq!(orders[1].amount, Some(0.5));
}

#[tokio::test]
async fn test_invalid_orders_never_reach_the_exchange() {
    let gateway = connect(listing()).await;

    assert!(matches!(
        gateway.sell("BTC", 0.0).await,
        Err(GatewayError::InvalidParameter(_))
    ));
    assert!(matches!(
        gateway.buy("EUR", 10.0).await,
        Err(GatewayError::InvalidParameter(_))
    ));
    assert!(gateway.api().placed_orders().is_empty());
}

#[tokio::test]
async fn test_rejected_order_is_reported_once() {
    let gateway = connect(listing().rejecting("ETH")).await;

    match gateway.buy("ETH", 10.0).await {
        Err(GatewayError::OrderRejected { symbol, reason }) => {
            assert_eq!(symbol, "ETH");
            assert!(reason.contains("sufficient balance"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(gateway.api().placed_orders().len(), 1);
}

#[tokio::test]
async fn test_liquidate_all_continues_after_rejection() {
    let gateway = connect(
        listing()
            .rejecting("ETH")
            .with_balance("EUR", 10.0, 0.0)
            .with_balance("BTC", 0.1, 0.0)
            .with_balance("ETH", 1.0, 0.0)
            .with_balance("SOL", 4.0, 0.0),
    )
    .await;

    let outcomes = gateway.liquidate_all().await.unwrap();

    let symbols: Vec<&str> = outcomes.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
    assert!(outcomes[0].1.is_ok());
    assert!(matches!(
        outcomes[1].1,
        Err(GatewayError::OrderRejected { .. })
    ));
    assert!(outcomes[2].1.is_ok());
    assert_eq!(gateway.api().placed_orders().len(), 3);

    assert_eq!(gateway.owned_amount("SOL").await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_liquidate_all_skips_amounts_held_in_orders() {
    let gateway = connect(
        listing()
            .with_balance("BTC", 1.0, 0.0)
            .with_balance("ETH", 0.0, 2.0),
    )
    .await;

    let outcomes = gateway.liquidate_all().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, "BTC");
    assert!(outcomes[0].1.is_ok());

    let orders = gateway.api().placed_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].market, "BTC-EUR");
}

#[tokio::test]
async fn test_holdings_sorted_by_value() {
    let gateway = connect(
        listing()
            .with_ticker("BTC", 100.0, 110.0, 1e7)
            .with_balance("EUR", 10.0, 0.0)
            .with_balance("SOL", 10.0, 0.0)
            .with_balance("BTC", 0.1, 0.0),
    )
    .await;

    let holdings = gateway.holdings().await.unwrap();

    assert_eq!(holdings.len(), 2);
    assert_eq!(holdings[0].symbol, "BTC");
    assert_eq!(holdings[0].value, 2_000.0);
    assert!((holdings[0].change_24h_pct - 10.0).abs() < 1e-9);
    assert_eq!(holdings[1].symbol, "SOL");
    assert_eq!(holdings[1].value, 500.0);
    assert_eq!(holdings[1].change_24h_pct, 0.0);
}
