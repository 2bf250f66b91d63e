//! # Trading State - Candle Series and Portfolio Stores
//!
//! ## Purpose
//!
//! Persistence seams for the opportunity rotation engine plus concurrent
//! in-memory implementations used by the service binary and the test suites.
//!
//! ## Architecture Role
//!
//! ```text
//! Ingestion Gate ──upsert──▶ [CandleStore] ◀──window/latest── Indicator & Scoring Engines
//!                                                                     │
//! Decision Engine ──open_by_symbol──▶ [HoldingStore] ◀──settlement────┘
//!        │                ▲
//!        └──join──▶ [PreferenceStore]    [OrderStore] ◀── saga state
//! ```
//!
//! ## Concurrency
//!
//! All stores are `DashMap`-backed with per-entry locks; no operation holds a
//! lock across an await point. The candle store serializes writes per symbol so
//! bucket upserts merge instead of duplicating rows.

pub mod candles;
pub mod portfolio;
pub mod preferences;
pub mod traits;

pub use candles::InMemoryCandleStore;
pub use portfolio::{InMemoryHoldingStore, InMemoryOrderStore};
pub use preferences::InMemoryPreferenceStore;

// Re-export core traits for convenience
pub use traits::{
    CandleStore, HoldingStore, OrderStore, PreferenceStore, StoreError, StoreResult,
};
