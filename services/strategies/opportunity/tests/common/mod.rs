//! Shared fixtures for opportunity strategy integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use opportunity_strategy::{DecisionEngine, MarketDataService, StrategyConfig};
use rust_decimal::Decimal;
use state_trading::{
    CandleStore, HoldingStore, InMemoryCandleStore, InMemoryHoldingStore, InMemoryOrderStore,
    InMemoryPreferenceStore, PreferenceStore,
};
use torq_strategy_shared::{MetricsCollector, MockExchange, Notifier, RecordingNotifier};
use types::{Algorithm, CandlePoint, Holding, RiskLevel, TradingPreference};
use uuid::Uuid;

pub fn test_config() -> StrategyConfig {
    StrategyConfig {
        settlement_backoff: Duration::from_millis(1),
        ..StrategyConfig::default()
    }
}

/// Stores, doubles and a decision engine over them
pub struct Desk {
    pub candles: Arc<InMemoryCandleStore>,
    pub holdings: Arc<InMemoryHoldingStore>,
    pub orders: Arc<InMemoryOrderStore>,
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub exchange: Arc<MockExchange>,
    pub notifier: Arc<RecordingNotifier>,
    pub metrics: Arc<MetricsCollector>,
    pub market: Arc<MarketDataService>,
    pub engine: DecisionEngine,
}

impl Desk {
    pub fn new() -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        Self::build(notifier.clone(), notifier)
    }

    /// Desk whose engine sends to `notifier` instead of the recorder
    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self::build(notifier, Arc::new(RecordingNotifier::new()))
    }

    fn build(notifier: Arc<dyn Notifier>, recorder: Arc<RecordingNotifier>) -> Self {
        let config = test_config();
        let candles = Arc::new(InMemoryCandleStore::new());
        let holdings = Arc::new(InMemoryHoldingStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let preferences = Arc::new(InMemoryPreferenceStore::new());
        let exchange = Arc::new(MockExchange::new());
        let metrics = Arc::new(MetricsCollector::new());
        let market = Arc::new(MarketDataService::new(
            candles.clone(),
            config.clone(),
            metrics.clone(),
        ));
        let engine = DecisionEngine::new(
            market.clone(),
            holdings.clone(),
            orders.clone(),
            preferences.clone(),
            exchange.clone(),
            notifier,
            config,
            metrics.clone(),
        );
        Self {
            candles,
            holdings,
            orders,
            preferences,
            exchange,
            notifier: recorder,
            metrics,
            market,
            engine,
        }
    }

    /// Persist a fresh point for `symbol` carrying `score`
    pub async fn score(&self, symbol: &str, score: f64) {
        let point = CandlePoint::new(Uuid::new_v4(), symbol, Utc::now(), 1.0, 1.0, 1.0, 1.0, 1.0);
        let mut stored = self.candles.upsert(point).await.unwrap();
        stored.score = Some(score);
        self.candles.update(&stored).await.unwrap();
    }

    pub async fn user(&self, risk: RiskLevel, watchlist: &[&str]) -> Uuid {
        let user_id = Uuid::new_v4();
        let preference = TradingPreference::new(
            user_id,
            Algorithm::SwingTrading,
            risk,
            watchlist.iter().copied(),
        );
        self.preferences.upsert(preference).await.unwrap();
        user_id
    }

    pub async fn edit_preference(&self, user_id: Uuid, edit: impl FnOnce(&mut TradingPreference)) {
        let mut preference = self.preferences.by_user(user_id).await.unwrap().unwrap();
        edit(&mut preference);
        self.preferences.upsert(preference).await.unwrap();
    }

    /// Open a holding and fund its asset on the exchange
    pub async fn hold(
        &self,
        user_id: Uuid,
        symbol: &str,
        quantity: Decimal,
        entry_price: Decimal,
        entry_score: f64,
    ) -> Holding {
        let holding = Holding::open(user_id, symbol, quantity, entry_price, entry_score);
        self.exchange.set_balance(holding.asset(), quantity);
        self.holdings.insert(holding.clone()).await.unwrap();
        holding
    }

    pub async fn holding(&self, id: Uuid) -> Holding {
        self.holdings.get(id).await.unwrap().unwrap()
    }
}
