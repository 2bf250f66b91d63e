//! Bus-facing event handler
//!
//! Each delivery is one unit of work: decode, dispatch, then `ack` on success.
//! On failure the delivery is `nak`ed and a [`DeadLetter`] describing it is
//! published on the dead-letter subject.

use std::sync::Arc;

use message_bus::{Delivery, EventBus, Subscription};
use serde::{Deserialize, Serialize};
use torq_strategy_shared::MetricsCollector;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use types::{CandlePushed, MarketEvent, RecomputeRequested};
use uuid::Uuid;

use crate::config::StrategyConfig;
use crate::decision::DecisionEngine;
use crate::error::{Result, StrategyError};
use crate::ingestion::{IngestOutcome, IngestionGate};
use crate::market::MarketDataService;
use crate::signals::DecisionOutcome;

/// Payload published on the dead-letter subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub subject: String,
    pub message_id: u64,
    pub error: String,
    /// Original payload, lossily decoded as UTF-8
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    Ingested(IngestOutcome),
    Recomputed {
        point_id: Uuid,
        score: Option<f64>,
        decisions: Vec<DecisionOutcome>,
    },
}

#[derive(Debug)]
pub struct MarketEventHandler {
    gate: IngestionGate,
    market: Arc<MarketDataService>,
    decisions: Arc<DecisionEngine>,
    bus: Arc<dyn EventBus>,
    config: StrategyConfig,
    metrics: Arc<MetricsCollector>,
}

impl MarketEventHandler {
    pub fn new(
        gate: IngestionGate,
        market: Arc<MarketDataService>,
        decisions: Arc<DecisionEngine>,
        bus: Arc<dyn EventBus>,
        config: StrategyConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            gate,
            market,
            decisions,
            bus,
            config,
            metrics,
        }
    }

    pub async fn handle(&self, event: MarketEvent) -> Result<HandleOutcome> {
        match event {
            MarketEvent::MarketDataPushed(candle) => self.on_candle(candle).await,
            MarketEvent::PartialMarketData(request) => self.on_recompute(request).await,
        }
    }

    async fn on_candle(&self, candle: CandlePushed) -> Result<HandleOutcome> {
        Ok(HandleOutcome::Ingested(self.gate.ingest(&candle).await?))
    }

    async fn on_recompute(&self, request: RecomputeRequested) -> Result<HandleOutcome> {
        let point = self.market.recompute(request.datapoint_id).await?;

        let decisions = match point.score {
            Some(_) if self.config.decide_on_score => {
                self.decisions.evaluate_symbol(&point.symbol).await?
            }
            _ => Vec::new(),
        };

        Ok(HandleOutcome::Recomputed {
            point_id: point.id,
            score: point.score,
            decisions,
        })
    }

    /// Process one delivery and settle it
    pub async fn process(&self, delivery: Delivery) {
        self.metrics.increment_messages();

        let result = match MarketEvent::from_bytes(delivery.payload()) {
            Ok(event) => self.handle(event).await.map(|_| ()),
            Err(e) => Err(StrategyError::from(e)),
        };

        match result {
            Ok(()) => {
                if let Err(e) = delivery.ack() {
                    warn!(message_id = delivery.message().id, error = %e, "ack failed");
                }
            }
            Err(error) => {
                self.metrics.increment_errors();
                match &error {
                    // expected while a series is still warming up
                    StrategyError::InsufficientData { .. } => {
                        debug!(message_id = delivery.message().id, error = %error, "event rejected")
                    }
                    _ => warn!(message_id = delivery.message().id, error = %error, "event rejected"),
                }
                if let Err(e) = delivery.nak() {
                    warn!(message_id = delivery.message().id, error = %e, "nak failed");
                }
                self.dead_letter(&delivery, &error).await;
            }
        }
    }

    async fn dead_letter(&self, delivery: &Delivery, error: &StrategyError) {
        let letter = DeadLetter {
            subject: delivery.subject().to_string(),
            message_id: delivery.message().id,
            error: error.to_string(),
            payload: String::from_utf8_lossy(delivery.payload()).into_owned(),
        };
        let payload = match serde_json::to_vec(&letter) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(message_id = letter.message_id, error = %e, "failed to encode dead letter");
                return;
            }
        };
        if let Err(e) = self.bus.publish(&self.config.dlq_subject, payload).await {
            warn!(
                message_id = letter.message_id,
                subject = %self.config.dlq_subject,
                error = %e,
                "dead-letter publish failed"
            );
        }
    }

    /// Consume deliveries until the subscription closes or shutdown is signalled
    pub async fn run(&self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(pattern = subscription.pattern(), "event handler running");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = subscription.next() => match next {
                    Some(delivery) => self.process(delivery).await,
                    None => break,
                },
            }
        }
        info!(pattern = subscription.pattern(), "event handler stopped");
    }
}
