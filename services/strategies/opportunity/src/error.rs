//! Error types for the opportunity rotation strategy

use chrono::{DateTime, Utc};
use message_bus::BusError;
use rust_decimal::Decimal;
use state_trading::StoreError;
use thiserror::Error;
use torq_strategy_shared::ExchangeError;
use types::ValidationError;

use crate::indicators::IndicatorFamily;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient data for {family}: need {required} points, have {actual}")]
    InsufficientData {
        family: IndicatorFamily,
        required: usize,
        actual: usize,
    },

    #[error("Market data for {symbol} is stale (last point at {timestamp})")]
    Stale {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("Latest point for {symbol} has no score")]
    NoScore { symbol: String },

    #[error("No watchlist symbol could be ranked")]
    NoRankedSymbols,

    #[error("Conversion drift {drift} exceeds maximum {max}")]
    ConversionDriftExceeded { drift: Decimal, max: Decimal },

    #[error("Conversion quote expired")]
    QuoteExpired,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("No usable price for {symbol}")]
    InvalidPrice { symbol: String },

    #[error("Exchange error: {0}")]
    Exchange(ExchangeError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Undecodable event: {message}")]
    Decode { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl StrategyError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StrategyError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Domain outcomes that skip one symbol during ranking instead of failing it
    pub fn is_unrankable(&self) -> bool {
        matches!(
            self,
            StrategyError::Stale { .. } | StrategyError::NoScore { .. } | StrategyError::NotFound { .. }
        )
    }
}

impl From<ExchangeError> for StrategyError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::QuoteExpired => StrategyError::QuoteExpired,
            ExchangeError::InsufficientBalance => StrategyError::InsufficientBalance,
            other => StrategyError::Exchange(other),
        }
    }
}

impl From<StoreError> for StrategyError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => StrategyError::not_found(entity, id),
            StoreError::Validation(inner) => StrategyError::Validation(inner),
            other => StrategyError::Store(other),
        }
    }
}

impl From<serde_json::Error> for StrategyError {
    fn from(error: serde_json::Error) -> Self {
        StrategyError::Decode {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrategyError>;
