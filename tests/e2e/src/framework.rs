//! Core E2E testing framework

use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use message_bus::{BusStats, EventBus, InMemoryBus};
use opportunity_strategy::{
    Collaborators, DeadLetter, OpportunityStrategy, PaperExchange, StrategyConfig,
};
use rust_decimal::Decimal;
use state_trading::{
    HoldingStore, InMemoryCandleStore, InMemoryHoldingStore, InMemoryOrderStore,
    InMemoryPreferenceStore, PreferenceStore,
};
use torq_strategy_shared::{Exchange, RecordingNotifier, Strategy, StrategyMetrics};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use types::{Algorithm, CandlePushed, Holding, MarketEvent, RiskLevel, TradingPreference};
use uuid::Uuid;

pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

static LOGGING: Once = Once::new();

/// Route strategy logs to the test writer, filtered by `RUST_LOG`
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A running strategy wired to in-memory stores and bus
pub struct TestHarness {
    pub bus: Arc<InMemoryBus>,
    pub candles: Arc<InMemoryCandleStore>,
    pub holdings: Arc<InMemoryHoldingStore>,
    pub orders: Arc<InMemoryOrderStore>,
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: StrategyConfig,
    strategy: OpportunityStrategy,
}

impl TestHarness {
    /// Build and start the strategy; `exchange` receives the candle store so a
    /// paper venue can price off it
    pub async fn start<F>(config: StrategyConfig, exchange: F) -> Result<Self>
    where
        F: FnOnce(Arc<InMemoryCandleStore>) -> Arc<dyn Exchange>,
    {
        init_test_logging();

        let bus = Arc::new(InMemoryBus::new(100_000));
        let candles = Arc::new(InMemoryCandleStore::new());
        let holdings = Arc::new(InMemoryHoldingStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let preferences = Arc::new(InMemoryPreferenceStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let mut strategy = OpportunityStrategy::new(
            config.clone(),
            Collaborators {
                candles: candles.clone(),
                holdings: holdings.clone(),
                orders: orders.clone(),
                preferences: preferences.clone(),
                exchange: exchange(candles.clone()),
                notifier: notifier.clone(),
                bus: bus.clone(),
            },
        )?;
        strategy.start().await?;

        Ok(Self {
            bus,
            candles,
            holdings,
            orders,
            preferences,
            notifier,
            config,
            strategy,
        })
    }

    /// Harness trading against a paper venue priced off the ingested candles
    pub async fn with_paper_exchange(config: StrategyConfig) -> Result<(Self, Arc<PaperExchange>)> {
        let mut paper = None;
        let harness = Self::start(config, |candles| {
            let exchange = Arc::new(PaperExchange::new(candles));
            paper = Some(exchange.clone());
            exchange as Arc<dyn Exchange>
        })
        .await?;
        let paper = paper.context("paper exchange was not built")?;
        Ok((harness, paper))
    }

    pub async fn with_exchange(config: StrategyConfig, exchange: Arc<dyn Exchange>) -> Result<Self> {
        Self::start(config, move |_| exchange).await
    }

    pub async fn publish(&self, event: impl Into<MarketEvent>) -> Result<()> {
        let payload = event.into().to_bytes()?;
        self.publish_raw(payload).await
    }

    pub async fn publish_raw(&self, payload: Vec<u8>) -> Result<()> {
        self.bus
            .publish(&self.config.market_data_subject, payload)
            .await
            .context("publish to market data subject")
    }

    pub async fn publish_all(&self, candles: &[CandlePushed]) -> Result<()> {
        for candle in candles {
            self.publish(candle.clone()).await?;
        }
        Ok(())
    }

    /// Wait until every delivery is settled and the bus is quiet
    pub async fn settle(&self) -> Result<BusStats> {
        self.settle_within(DEFAULT_SETTLE_TIMEOUT).await
    }

    pub async fn settle_within(&self, timeout: Duration) -> Result<BusStats> {
        let wait = async {
            let mut previous = self.bus.stats();
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                let current = self.bus.stats();
                if current == previous && current.delivered == current.acked + current.nacked {
                    return current;
                }
                previous = current;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(stats) => {
                debug!(?stats, "bus settled");
                Ok(stats)
            }
            Err(_) => bail!("bus did not settle within {:?}: {:?}", timeout, self.bus.stats()),
        }
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.bus
            .published_on(&self.config.dlq_subject)
            .iter()
            .map(|m| serde_json::from_slice(&m.payload).context("decode dead letter"))
            .collect()
    }

    pub fn metrics(&self) -> StrategyMetrics {
        self.strategy.metrics()
    }

    /// Operating preference for a new user
    pub async fn add_user(
        &self,
        risk: RiskLevel,
        watchlist: &[&str],
        stop_loss_enabled: bool,
    ) -> Result<Uuid> {
        let user_id = Uuid::new_v4();
        let mut preference = TradingPreference::new(
            user_id,
            Algorithm::SwingTrading,
            risk,
            watchlist.iter().copied(),
        );
        preference.stop_loss_enabled = stop_loss_enabled;
        self.preferences.upsert(preference).await?;
        Ok(user_id)
    }

    pub async fn add_holding(
        &self,
        user_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        entry_price: Decimal,
        entry_score: f64,
    ) -> Result<Holding> {
        let holding = Holding::open(user_id, symbol, quantity, entry_price, entry_score);
        self.holdings.insert(holding.clone()).await?;
        Ok(holding)
    }

    pub async fn holdings_of(&self, user_id: Uuid) -> Result<Vec<Holding>> {
        Ok(self.holdings.by_user(user_id).await?)
    }

    pub async fn shutdown(mut self) -> Result<StrategyMetrics> {
        self.strategy.stop().await?;
        Ok(self.strategy.metrics())
    }
}
