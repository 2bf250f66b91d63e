//! # Opportunity Strategy - Score-Driven Holding Rotation
//!
//! ## Purpose
//!
//! Consumes closed one-minute candles for USDT-quoted pairs, maintains seven
//! technical indicator families per point, condenses them into a 0-100
//! opportunity score and rotates user holdings toward the best-scored symbol on
//! their watchlist. When nothing on the watchlist is attractive enough the
//! holding is parked in USDT instead (stop-loss).
//!
//! ## Integration Points
//!
//! - **Input**: `market_data_pushed` and `partial_market_data` JSON events on the
//!   market data subject of the [`message_bus`]
//! - **Output**: dead letters for rejected events, conversions through the
//!   [`Exchange`](torq_strategy_shared::Exchange) collaborator, trade texts
//!   through the [`Notifier`](torq_strategy_shared::Notifier)
//! - **State**: candles, holdings, orders and preferences behind the
//!   `state_trading` store traits
//! - **Configuration**: `service_config::ServiceConfig`, narrowed into
//!   [`StrategyConfig`]
//!
//! ## Architecture Role
//!
//! ```text
//! market_data_pushed ──▶ [IngestionGate] ──upsert──▶ CandleStore
//!                              │
//!                   partial_market_data (recompute request)
//!                              ▼
//!                   [MarketDataService] ──indicators + score──▶ CandleStore
//!                              │
//!                   score written ▼
//!                      [DecisionEngine] ──rank watchlist──▶ rotate / stop-loss
//!                              │
//!               Order ─▶ quote ─▶ accept ─▶ close source, open destination
//! ```
//!
//! Every delivery is acked once handled. Failures are nak'd and republished as
//! a [`DeadLetter`] on the dead-letter subject.
//!
//! ## Numeric Conventions
//!
//! Indicator series and scores are `f64`. Quantities, prices, profits and drift
//! are `rust_decimal::Decimal`.
//!
//! ## Examples
//!
//! ### Scoring a point
//! ```rust
//! use opportunity_strategy::scoring::opportunity_score;
//! use types::CandlePoint;
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! let mut point = CandlePoint::new(Uuid::new_v4(), "BTCUSDT", Utc::now(), 100.0, 101.0, 99.0, 100.0, 5.0);
//! assert_eq!(opportunity_score(&point), None);
//!
//! point.indicators.atr = Some(1.5);
//! let score = opportunity_score(&point).unwrap();
//! assert!((0.0..=100.0).contains(&score));
//! ```
//!
//! ### Running against the in-memory bus
//! ```rust,no_run
//! use std::sync::Arc;
//! use message_bus::InMemoryBus;
//! use opportunity_strategy::{Collaborators, OpportunityStrategy, StrategyConfig};
//! use state_trading::{InMemoryCandleStore, InMemoryHoldingStore, InMemoryOrderStore, InMemoryPreferenceStore};
//! use torq_strategy_shared::{LogNotifier, MockExchange, Strategy};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let collaborators = Collaborators {
//!     candles: Arc::new(InMemoryCandleStore::new()),
//!     holdings: Arc::new(InMemoryHoldingStore::new()),
//!     orders: Arc::new(InMemoryOrderStore::new()),
//!     preferences: Arc::new(InMemoryPreferenceStore::new()),
//!     exchange: Arc::new(MockExchange::new()),
//!     notifier: Arc::new(LogNotifier),
//!     bus: Arc::new(InMemoryBus::new(10_000)),
//! };
//! let mut strategy = OpportunityStrategy::new(StrategyConfig::default(), collaborators)?;
//! strategy.start().await?;
//! // publish candle events on "market.candles" ...
//! strategy.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod handler;
pub mod indicators;
pub mod ingestion;
pub mod logging;
pub mod market;
pub mod notifications;
pub mod paper;
pub mod scoring;
pub mod signals;
pub mod strategy;

pub use config::{StrategyConfig, TierPolicy};
pub use decision::{pull_back_verdict, DecisionEngine, ReconcileReport};
pub use error::{Result, StrategyError};
pub use handler::{DeadLetter, HandleOutcome, MarketEventHandler};
pub use indicators::IndicatorFamily;
pub use ingestion::{IngestOutcome, IngestionGate};
pub use market::MarketDataService;
pub use paper::{PaperExchange, PaperPortfolio};
pub use signals::{DecisionOutcome, PullBackSignal, SignalStats, TradeReceipt};
pub use strategy::{Collaborators, OpportunityStrategy};

pub use rust_decimal::Decimal;
