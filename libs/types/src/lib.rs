//! # Torq Opportunity Types
//!
//! Domain types shared by the opportunity rotation strategy, its stores and its
//! event bus.
//!
//! ## Layout
//!
//! - [`market`]: per-minute [`CandlePoint`] rows with computed [`Indicators`]
//! - [`trading`]: preferences, holdings, orders and ranked symbol scores
//! - [`exchange`]: tickers, balances and conversion quotes
//! - [`events`]: the [`MarketEvent`] payloads published on the bus
//! - [`common`]: [`ValidationError`] and quote-asset symbol helpers
//!
//! ## Numeric conventions
//!
//! Money (quantities, prices, profits, balances, quote amounts) is
//! `rust_decimal::Decimal`. Candle OHLCV, indicator series and opportunity scores
//! are `f64`; they are statistics, never settled amounts.
//!
//! ```rust
//! use types::{CandlePoint, QUOTE_ASSET};
//! use chrono::Utc;
//! use uuid::Uuid;
//!
//! let point = CandlePoint::new(Uuid::new_v4(), "BTCUSDT", Utc::now(), 1.0, 1.2, 0.9, 1.1, 42.0);
//! assert!(point.validate().is_ok());
//! assert!(point.symbol.ends_with(QUOTE_ASSET));
//! ```

pub mod common;
pub mod events;
pub mod exchange;
pub mod market;
pub mod trading;

pub use common::{base_asset, is_quote_asset, is_quoted_pair, ValidationError, QUOTE_ASSET};
pub use events::{CandlePushed, MarketEvent, RecomputeRequested};
pub use exchange::{Balance, ConversionOrder, ConversionQuote, Ticker};
pub use market::{minute_bucket, CandlePoint, Indicators};
pub use trading::{
    Algorithm, Holding, HoldingStatus, Order, OrderConfig, OrderStatus, RiskLevel, SymbolScore,
    TradeType, TradingPosition, TradingPreference,
};
