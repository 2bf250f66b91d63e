//! Ingestion and idempotency gate
//!
//! Turns `market_data_pushed` events into persisted candle points. A redelivered
//! event is recognized by its correlation id; partial candles never reach the
//! store. Every accepted point triggers a recompute through the bus.

use std::sync::Arc;

use message_bus::EventBus;
use state_trading::CandleStore;
use torq_strategy_shared::MetricsCollector;
use tracing::{debug, trace};
use types::{CandlePoint, CandlePushed, MarketEvent, RecomputeRequested};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Correlation id already absorbed by `point_id`
    Duplicate { point_id: Uuid },
    /// Candle not closed yet
    PartialDropped,
    /// Persisted (inserted or merged) and recompute requested
    Accepted(CandlePoint),
}

#[derive(Debug)]
pub struct IngestionGate {
    candles: Arc<dyn CandleStore>,
    bus: Arc<dyn EventBus>,
    recompute_subject: String,
    metrics: Arc<MetricsCollector>,
}

impl IngestionGate {
    pub fn new(
        candles: Arc<dyn CandleStore>,
        bus: Arc<dyn EventBus>,
        recompute_subject: impl Into<String>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            candles,
            bus,
            recompute_subject: recompute_subject.into(),
            metrics,
        }
    }

    pub async fn ingest(&self, event: &CandlePushed) -> Result<IngestOutcome> {
        if let Some(existing) = self.candles.find_by_correlation_id(event.id).await? {
            debug!(
                correlation_id = %event.id,
                point_id = %existing.id,
                "duplicate candle event skipped"
            );
            self.metrics.increment_duplicates();
            return Ok(IngestOutcome::Duplicate {
                point_id: existing.id,
            });
        }

        if !event.candle_closed {
            debug!(symbol = %event.symbol, timestamp = %event.timestamp, "partial candle dropped");
            self.metrics.increment_partial_drops();
            return Ok(IngestOutcome::PartialDropped);
        }

        let point = event.to_point();
        point.validate()?;

        let persisted = self.candles.upsert(point).await?;
        trace!(
            symbol = %persisted.symbol,
            point_id = %persisted.id,
            timestamp = %persisted.timestamp,
            "candle persisted"
        );
        self.metrics.increment_candles();

        let request = MarketEvent::from(RecomputeRequested {
            datapoint_id: persisted.id,
        });
        self.bus
            .publish(&self.recompute_subject, request.to_bytes()?)
            .await?;

        Ok(IngestOutcome::Accepted(persisted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use message_bus::InMemoryBus;
    use state_trading::InMemoryCandleStore;
    use types::ValidationError;

    use crate::error::StrategyError;

    const SUBJECT: &str = "market.candles";

    fn setup() -> (IngestionGate, Arc<InMemoryCandleStore>, Arc<InMemoryBus>) {
        let candles = Arc::new(InMemoryCandleStore::new());
        let bus = Arc::new(InMemoryBus::default());
        let gate = IngestionGate::new(
            candles.clone(),
            bus.clone(),
            SUBJECT,
            Arc::new(MetricsCollector::new()),
        );
        (gate, candles, bus)
    }

    fn event(symbol: &str, second: u32, close: f64) -> CandlePushed {
        CandlePushed {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10.0,
            candle_closed: true,
        }
    }

    #[tokio::test]
    async fn test_same_correlation_id_is_ingested_once() {
        let (gate, candles, bus) = setup();
        let candle = event("BTCUSDT", 5, 100.0);

        let first = gate.ingest(&candle).await.unwrap();
        let second = gate.ingest(&candle).await.unwrap();

        let IngestOutcome::Accepted(point) = first else {
            panic!("first delivery should be accepted");
        };
        assert_eq!(second, IngestOutcome::Duplicate { point_id: point.id });
        assert_eq!(candles.len(), 1);
        assert_eq!(bus.published_on(SUBJECT).len(), 1);
    }

    #[tokio::test]
    async fn test_same_bucket_merges_second_ohlcv() {
        let (gate, candles, bus) = setup();
        gate.ingest(&event("BTCUSDT", 5, 100.0)).await.unwrap();
        gate.ingest(&event("BTCUSDT", 40, 105.0)).await.unwrap();

        let series = candles.series("BTCUSDT");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, 105.0);

        // both writes request a recompute of the same row
        let requests: Vec<_> = bus
            .published_on(SUBJECT)
            .iter()
            .map(|m| MarketEvent::from_bytes(&m.payload).unwrap())
            .collect();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn test_redelivered_first_event_after_merge_is_duplicate() {
        let (gate, candles, _bus) = setup();
        let first = event("BTCUSDT", 5, 100.0);
        gate.ingest(&first).await.unwrap();
        gate.ingest(&event("BTCUSDT", 30, 101.0)).await.unwrap();

        assert!(matches!(
            gate.ingest(&first).await.unwrap(),
            IngestOutcome::Duplicate { .. }
        ));
        assert_eq!(candles.series("BTCUSDT")[0].close, 101.0);
    }

    #[tokio::test]
    async fn test_partial_candle_dropped() {
        let (gate, candles, bus) = setup();
        let mut partial = event("BTCUSDT", 5, 100.0);
        partial.candle_closed = false;

        assert_eq!(gate.ingest(&partial).await.unwrap(), IngestOutcome::PartialDropped);
        assert!(candles.is_empty());
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let (gate, candles, _bus) = setup();

        let bad_symbol = event("BTCEUR", 5, 100.0);
        assert!(matches!(
            gate.ingest(&bad_symbol).await,
            Err(StrategyError::Validation(ValidationError::InvalidSymbol { .. }))
        ));

        let mut negative = event("BTCUSDT", 5, 100.0);
        negative.low = -1.0;
        assert!(matches!(
            gate.ingest(&negative).await,
            Err(StrategyError::Validation(ValidationError::NegativeValue { field: "low", .. }))
        ));

        let mut epoch = event("BTCUSDT", 5, 100.0);
        epoch.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        assert!(gate.ingest(&epoch).await.is_err());

        let mut later = event("ETHUSDT", 5, 100.0);
        later.timestamp += Duration::minutes(1);
        assert!(gate.ingest(&later).await.is_ok());
        assert_eq!(candles.len(), 1);
    }
}
