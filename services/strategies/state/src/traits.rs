//! Store Traits
//!
//! Persistence seams for the opportunity engine. Every query the core needs is a
//! trait method, so the engine runs unchanged against the in-memory stores in
//! this crate or an external database.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use types::{CandlePoint, Holding, Order, TradingPreference, ValidationError};
use uuid::Uuid;

/// Error types for store operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: Uuid },

    #[error("Invalid {0}")]
    Validation(#[from] ValidationError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        StoreError::NotFound { entity, id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-minute candle series
#[async_trait]
pub trait CandleStore: Send + Sync + Debug {
    async fn get(&self, id: Uuid) -> StoreResult<Option<CandlePoint>>;

    /// Point that absorbed the event with `correlation_id`, including events
    /// merged into an existing bucket
    async fn find_by_correlation_id(&self, correlation_id: Uuid)
        -> StoreResult<Option<CandlePoint>>;

    /// Point for `symbol` whose bucket starts in `[start, end)`
    async fn find_in_bucket(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Option<CandlePoint>>;

    /// Insert `point`, or merge it into the row already holding its minute bucket.
    /// Returns the persisted row.
    async fn upsert(&self, point: CandlePoint) -> StoreResult<CandlePoint>;

    /// Replace an existing row (indicators, score)
    async fn update(&self, point: &CandlePoint) -> StoreResult<()>;

    /// The most recent `limit` points with `start <= timestamp <= end`,
    /// oldest first
    async fn window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<CandlePoint>>;

    /// Point with the greatest timestamp for `symbol`
    async fn latest(&self, symbol: &str) -> StoreResult<Option<CandlePoint>>;
}

#[async_trait]
pub trait HoldingStore: Send + Sync + Debug {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Holding>>;

    async fn insert(&self, holding: Holding) -> StoreResult<()>;

    async fn update(&self, holding: &Holding) -> StoreResult<()>;

    /// Open holdings in `symbol`, served from a (symbol, status) index
    async fn open_by_symbol(&self, symbol: &str) -> StoreResult<Vec<Holding>>;

    /// Holding opened by the settlement of `order_id`
    async fn find_by_origin_order(&self, order_id: Uuid) -> StoreResult<Option<Holding>>;

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Vec<Holding>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync + Debug {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn insert(&self, order: Order) -> StoreResult<()>;

    async fn update(&self, order: &Order) -> StoreResult<()>;

    /// Orders still in `Open` status, oldest first
    async fn open_orders(&self) -> StoreResult<Vec<Order>>;

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync + Debug {
    /// Insert or replace the preference for its user
    async fn upsert(&self, preference: TradingPreference) -> StoreResult<()>;

    async fn by_user(&self, user_id: Uuid) -> StoreResult<Option<TradingPreference>>;

    /// Preferences with `operate = true` for the given users, keyed by user
    async fn operating_for_users(
        &self,
        user_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, TradingPreference>>;
}
