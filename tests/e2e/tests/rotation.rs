//! Rotation and stop-loss driven end to end by scored candles

use std::sync::Arc;

use anyhow::Result;
use opportunity_strategy::StrategyConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use torq_e2e_tests::{warm_series, TestHarness};
use torq_strategy_shared::MockExchange;
use types::{HoldingStatus, OrderStatus, RiskLevel, TradeType};

/// ETH is scored first so it can be ranked once BTC's latest point scores
async fn publish_market(harness: &TestHarness) -> Result<()> {
    harness.publish_all(&warm_series("ETHUSDT", 2000.0)).await?;
    harness.publish_all(&warm_series("BTCUSDT", 100.0)).await?;
    harness.settle().await?;
    Ok(())
}

#[tokio::test]
async fn test_pulled_back_holding_rotates_into_best_symbol() -> Result<()> {
    let (harness, paper) = TestHarness::with_paper_exchange(StrategyConfig::default()).await?;
    let user = harness.add_user(RiskLevel::High, &["ETHUSDT"], true).await?;
    let btc = harness
        .add_holding(user, "BTCUSDT", dec!(1), dec!(50), 100.0)
        .await?;
    paper.deposit("BTC", dec!(1));

    publish_market(&harness).await?;

    let holdings = harness.holdings_of(user).await?;
    assert_eq!(holdings.len(), 2);
    let closed = holdings.iter().find(|h| h.id == btc.id).expect("source holding");
    assert_eq!(closed.status, HoldingStatus::Closed);
    assert!(closed.profit > Decimal::ZERO);

    let opened = holdings.iter().find(|h| h.is_open()).expect("rotated holding");
    assert_eq!(opened.symbol, "ETHUSDT");
    let eth_score = harness.candles.series("ETHUSDT").pop().and_then(|p| p.score);
    assert_eq!(Some(opened.entry_score), eth_score);
    assert_eq!(paper.balance_of("BTC"), Decimal::ZERO);
    assert_eq!(paper.balance_of("ETH"), opened.quantity);

    let orders = harness.orders.all();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Filled);
    assert_eq!(orders[0].trade_type, TradeType::TakeProfit);
    assert_eq!(opened.origin_order_id, Some(orders[0].id));

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("BTCUSDT >> ETHUSDT"));

    // BTC's latest point stays unscored until its own recompute arrives
    assert_eq!(harness.dead_letters()?.len(), 2 * 199);
    let metrics = harness.shutdown().await?;
    assert_eq!(metrics.rotations, 1);
    assert_eq!(metrics.stop_losses, 0);
    Ok(())
}

#[tokio::test]
async fn test_unattractive_watchlist_triggers_stop_loss() -> Result<()> {
    let mut config = StrategyConfig::default();
    config.high.min_score = 101.0;
    let (harness, paper) = TestHarness::with_paper_exchange(config).await?;
    let user = harness.add_user(RiskLevel::High, &["ETHUSDT"], true).await?;
    harness
        .add_holding(user, "BTCUSDT", dec!(1), dec!(50), 100.0)
        .await?;
    paper.deposit("BTC", dec!(1));

    publish_market(&harness).await?;

    let parked = harness
        .holdings_of(user)
        .await?
        .into_iter()
        .find(|h| h.is_open())
        .expect("quote holding");
    assert_eq!(parked.symbol, "USDT");
    assert_eq!(parked.entry_price, Decimal::ONE);
    assert_eq!(parked.entry_score, 100.0);
    assert_eq!(paper.balance_of("USDT"), parked.quantity);

    let orders = harness.orders.all();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].trade_type, TradeType::StopLoss);

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Stop loss triggered"));
    assert!(messages[0].contains("BTCUSDT >> USDT"));

    assert_eq!(harness.metrics().stop_losses, 1);
    Ok(())
}

#[tokio::test]
async fn test_unattractive_watchlist_without_stop_loss_holds() -> Result<()> {
    let mut config = StrategyConfig::default();
    config.high.min_score = 101.0;
    let (harness, paper) = TestHarness::with_paper_exchange(config).await?;
    let user = harness.add_user(RiskLevel::High, &["ETHUSDT"], false).await?;
    let btc = harness
        .add_holding(user, "BTCUSDT", dec!(1), dec!(50), 100.0)
        .await?;
    paper.deposit("BTC", dec!(1));

    publish_market(&harness).await?;

    let holdings = harness.holdings_of(user).await?;
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].id, btc.id);
    assert!(holdings[0].is_open());
    assert!(harness.orders.is_empty());
    assert_eq!(paper.balance_of("BTC"), dec!(1));
    Ok(())
}

#[tokio::test]
async fn test_drifting_quote_aborts_without_writes() -> Result<()> {
    let exchange = Arc::new(
        MockExchange::new()
            .with_price("BTCUSDT", dec!(60000))
            .with_price("ETHUSDT", dec!(3000))
            .with_balance("BTC", dec!(1)),
    );
    exchange.set_quote_skew(dec!(1.1));
    let harness = TestHarness::with_exchange(StrategyConfig::default(), exchange.clone()).await?;
    let user = harness.add_user(RiskLevel::High, &["ETHUSDT"], true).await?;
    let btc = harness
        .add_holding(user, "BTCUSDT", dec!(1), dec!(50), 100.0)
        .await?;

    publish_market(&harness).await?;

    assert_eq!(exchange.quote_count(), 1);
    assert!(exchange.accepted_quotes().is_empty());
    assert!(harness.orders.is_empty());
    let holdings = harness.holdings_of(user).await?;
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].id, btc.id);
    assert!(holdings[0].is_open());
    assert!(harness.notifier.messages().is_empty());
    assert_eq!(exchange.balance_of("BTC"), dec!(1));
    Ok(())
}
