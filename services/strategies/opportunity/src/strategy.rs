//! Opportunity rotation strategy
//!
//! Wires the ingestion gate, market data service and decision engine behind one
//! bus subscription. `start` resumes interrupted conversions before the first
//! event is consumed; `stop` signals the handler loop and waits for the
//! in-flight delivery to settle.

use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use message_bus::EventBus;
use state_trading::{CandleStore, HoldingStore, OrderStore, PreferenceStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use torq_strategy_shared::{
    Exchange, MetricsCollector, Notifier, Strategy, StrategyConfig as _, StrategyMetrics,
};
use tracing::info;

use crate::config::StrategyConfig;
use crate::decision::DecisionEngine;
use crate::handler::MarketEventHandler;
use crate::ingestion::IngestionGate;
use crate::log_success;
use crate::market::MarketDataService;

/// Stores and external services the strategy runs against
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub candles: Arc<dyn CandleStore>,
    pub holdings: Arc<dyn HoldingStore>,
    pub orders: Arc<dyn OrderStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub exchange: Arc<dyn Exchange>,
    pub notifier: Arc<dyn Notifier>,
    pub bus: Arc<dyn EventBus>,
}

pub struct OpportunityStrategy {
    config: StrategyConfig,
    bus: Arc<dyn EventBus>,
    market: Arc<MarketDataService>,
    decisions: Arc<DecisionEngine>,
    handler: Arc<MarketEventHandler>,
    metrics: Arc<MetricsCollector>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl OpportunityStrategy {
    pub fn new(config: StrategyConfig, collaborators: Collaborators) -> anyhow::Result<Self> {
        config.validate()?;
        let metrics = Arc::new(MetricsCollector::new());

        let market = Arc::new(MarketDataService::new(
            collaborators.candles.clone(),
            config.clone(),
            metrics.clone(),
        ));
        let decisions = Arc::new(DecisionEngine::new(
            market.clone(),
            collaborators.holdings,
            collaborators.orders,
            collaborators.preferences,
            collaborators.exchange,
            collaborators.notifier,
            config.clone(),
            metrics.clone(),
        ));
        // recompute requests travel on the subject the handler consumes
        let gate = IngestionGate::new(
            collaborators.candles,
            collaborators.bus.clone(),
            config.market_data_subject.clone(),
            metrics.clone(),
        );
        let handler = Arc::new(MarketEventHandler::new(
            gate,
            market.clone(),
            decisions.clone(),
            collaborators.bus.clone(),
            config.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            bus: collaborators.bus,
            market,
            decisions,
            handler,
            metrics,
            shutdown: None,
            task: None,
        })
    }

    pub fn market(&self) -> Arc<MarketDataService> {
        self.market.clone()
    }

    pub fn decisions(&self) -> Arc<DecisionEngine> {
        self.decisions.clone()
    }

    pub fn handler(&self) -> Arc<MarketEventHandler> {
        self.handler.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl Strategy for OpportunityStrategy {
    fn name(&self) -> &'static str {
        "opportunity_rotation"
    }

    async fn start(&mut self) -> anyhow::Result<()> {
        if self.task.is_some() {
            bail!("{} is already running", self.name());
        }

        let report = self
            .decisions
            .reconcile_pending_orders()
            .await
            .context("failed to reconcile pending orders")?;
        info!(
            resumed = report.resumed,
            cancelled = report.cancelled,
            failed = report.failed,
            "pending orders reconciled"
        );

        let subscription = self
            .bus
            .subscribe(&self.config.market_data_subject)
            .await
            .with_context(|| format!("failed to subscribe to {}", self.config.market_data_subject))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = self.handler.clone();
        self.task = Some(tokio::spawn(async move {
            handler.run(subscription, shutdown_rx).await;
        }));
        self.shutdown = Some(shutdown_tx);

        log_success!(
            "{} consuming {} (dead letters on {})",
            self.name(),
            self.config.market_data_subject,
            self.config.dlq_subject
        );
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // the loop may already have exited on its own
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            task.await.context("event handler task panicked")?;
            info!("{} stopped", self.name());
        }
        Ok(())
    }

    fn metrics(&self) -> StrategyMetrics {
        self.metrics.get_metrics()
    }
}
