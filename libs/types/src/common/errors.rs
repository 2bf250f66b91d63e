//! Validation errors raised by domain entities
//!
//! Entities validate themselves before they are persisted. The ingestion gate and
//! the decision engine surface these as `StrategyError::Validation`.

use thiserror::Error;

/// Errors that can occur while validating a domain entity
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Symbol is not quoted in the unit-of-account asset
    #[error("invalid {entity} symbol '{symbol}': expected a USDT-quoted pair")]
    InvalidSymbol { entity: &'static str, symbol: String },

    /// Timestamp is zero or before the Unix epoch
    #[error("invalid {entity} timestamp: must be after the Unix epoch")]
    InvalidTimestamp { entity: &'static str },

    /// Numeric field that must not be negative
    #[error("invalid {entity} {field}: {value} is negative")]
    NegativeValue {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Numeric field that must be a finite number
    #[error("invalid {entity} {field}: value is not finite")]
    NotFinite {
        entity: &'static str,
        field: &'static str,
    },

    /// Watchlist entry that is not a quoted pair
    #[error("invalid watchlist element '{0}'")]
    InvalidWatchlistElement(String),

    /// Unknown tag for an enumerated field
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl ValidationError {
    pub(crate) fn negative(
        entity: &'static str,
        field: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::NegativeValue {
            entity,
            field,
            value: value.to_string(),
        }
    }
}
