//! Ingestion, recompute and dead-letter flow through the bus

use std::sync::Arc;

use anyhow::Result;
use opportunity_strategy::StrategyConfig;
use torq_e2e_tests::{same_minute_update, trending_series, warm_series, TestHarness};
use torq_strategy_shared::MockExchange;
use types::{CandlePoint, Indicators, MarketEvent};

async fn harness() -> Result<TestHarness> {
    TestHarness::with_exchange(StrategyConfig::default(), Arc::new(MockExchange::new())).await
}

fn latest(harness: &TestHarness, symbol: &str) -> CandlePoint {
    harness.candles.series(symbol).pop().expect("no points stored")
}

#[tokio::test]
async fn test_warm_series_scores_latest_point() -> Result<()> {
    let harness = harness().await?;
    harness.publish_all(&warm_series("BTCUSDT", 100.0)).await?;
    let stats = harness.settle().await?;

    assert_eq!(harness.candles.len(), 250);
    let point = latest(&harness, "BTCUSDT");
    assert!(
        point.indicators.is_complete(),
        "{} of {} indicator fields populated",
        point.indicators.populated(),
        Indicators::FIELD_COUNT
    );
    let score = point.score.expect("latest point unscored");
    assert!((0.0..=100.0).contains(&score));

    // points 1..=199 cannot fill the 200-bar SMA window that ends at them
    let letters = harness.dead_letters()?;
    assert_eq!(letters.len(), 199);
    assert!(letters
        .iter()
        .all(|l| l.error.starts_with("Insufficient data for")));

    let metrics = harness.metrics();
    assert_eq!(metrics.candles_ingested, 250);
    assert_eq!(metrics.recomputes, 250);
    assert_eq!(metrics.scores_written, 51);
    assert_eq!(stats.acked, 250 + 51);
    assert_eq!(stats.nacked, 199);

    harness.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_short_history_leaves_points_unscored() -> Result<()> {
    let harness = harness().await?;
    let candles = trending_series("ETHUSDT", 30, 2000.0, 1.002, chrono::Utc::now());
    harness.publish_all(&candles).await?;
    harness.settle().await?;

    assert_eq!(harness.candles.len(), 30);
    assert!(harness.candles.series("ETHUSDT").iter().all(|p| p.score.is_none()));
    assert_eq!(harness.dead_letters()?.len(), 30);
    Ok(())
}

#[tokio::test]
async fn test_redelivered_event_is_absorbed_once() -> Result<()> {
    let harness = harness().await?;
    let candle = warm_series("BTCUSDT", 100.0).remove(0);
    for _ in 0..3 {
        harness.publish(candle.clone()).await?;
    }
    harness.settle().await?;

    assert_eq!(harness.candles.len(), 1);
    let point = latest(&harness, "BTCUSDT");
    assert_eq!(point.correlation_id, candle.id);

    let metrics = harness.metrics();
    assert_eq!(metrics.candles_ingested, 1);
    assert_eq!(metrics.duplicates_skipped, 2);
    // three candles plus a single recompute request
    assert_eq!(
        harness
            .bus
            .published_on(&harness.config.market_data_subject)
            .len(),
        4
    );
    Ok(())
}

#[tokio::test]
async fn test_same_minute_update_merges_into_one_point() -> Result<()> {
    let harness = harness().await?;
    let first = warm_series("SOLUSDT", 150.0).remove(249);
    let second = same_minute_update(&first, first.close * 1.05);
    harness.publish(first.clone()).await?;
    harness.publish(second.clone()).await?;
    harness.settle().await?;

    assert_eq!(harness.candles.len(), 1);
    assert_eq!(harness.candles.merge_count(), 1);
    let point = latest(&harness, "SOLUSDT");
    assert_eq!(point.close, second.close);

    // both updates asked to recompute the same stored point
    let requested: Vec<_> = harness
        .bus
        .published_on(&harness.config.market_data_subject)
        .iter()
        .filter_map(|m| match MarketEvent::from_bytes(&m.payload) {
            Ok(MarketEvent::PartialMarketData(request)) => Some(request.datapoint_id),
            _ => None,
        })
        .collect();
    assert_eq!(requested, vec![point.id, point.id]);
    Ok(())
}

#[tokio::test]
async fn test_partial_candle_is_not_stored() -> Result<()> {
    let harness = harness().await?;
    let mut candle = warm_series("BTCUSDT", 100.0).remove(249);
    candle.candle_closed = false;
    harness.publish(candle).await?;
    let stats = harness.settle().await?;

    assert!(harness.candles.is_empty());
    assert_eq!(harness.metrics().partial_candles_dropped, 1);
    assert_eq!(stats.acked, 1);
    assert!(harness.dead_letters()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_bad_payloads_are_dead_lettered() -> Result<()> {
    let harness = harness().await?;
    harness.publish_raw(b"garbage".to_vec()).await?;
    harness
        .publish_raw(br#"{"type":"order_filled","id":"x"}"#.to_vec())
        .await?;
    let mut invalid = warm_series("BTCUSDT", 100.0).remove(249);
    invalid.low = -1.0;
    harness.publish(invalid).await?;
    // a good event after the bad ones still flows
    harness
        .publish(warm_series("ETHUSDT", 2000.0).remove(249))
        .await?;
    let stats = harness.settle().await?;

    let letters = harness.dead_letters()?;
    // three rejects plus the good candle's early recompute
    assert_eq!(letters.len(), 4);
    assert_eq!(letters[0].payload, "garbage");
    assert!(letters[0].error.starts_with("Undecodable event"));
    assert!(letters[1].error.starts_with("Undecodable event"));
    assert!(letters[2].error.starts_with("Validation error"));
    assert!(letters.iter().all(|l| l.subject == harness.config.market_data_subject));

    assert_eq!(harness.candles.len(), 1);
    assert_eq!(stats.nacked, 4);
    assert_eq!(stats.acked, 1);
    Ok(())
}
