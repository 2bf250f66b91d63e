//! Exchange collaborator
//!
//! The strategy never talks to an exchange SDK directly. Balances, tickers and
//! conversion quotes come through [`Exchange`]; venue clients, rate limiting and
//! order-book execution live behind it.

use std::fmt::Debug;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use types::{Balance, ConversionOrder, ConversionQuote, Ticker};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid quote amount")]
    InvalidQuoteAmount,

    #[error("Conversion quote expired")]
    QuoteExpired,

    #[error("Exchange unavailable: {0}")]
    Unavailable(String),
}

impl ExchangeError {
    /// Classify a raw venue error message. Anything unrecognized is treated as
    /// the venue being unavailable.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("insufficient balance") {
            Self::InsufficientBalance
        } else if lower.contains("quote expired") || lower.contains("quote has expired") {
            Self::QuoteExpired
        } else if lower.contains("invalid symbol") {
            Self::InvalidSymbol(message.to_string())
        } else if lower.contains("invalid amount") || lower.contains("invalid quote amount") {
            Self::InvalidQuoteAmount
        } else {
            Self::Unavailable(message.to_string())
        }
    }
}

#[async_trait]
pub trait Exchange: Send + Sync + Debug {
    /// Balance of a single asset (`BTC`, `USDT`)
    async fn balance(&self, asset: &str) -> Result<Balance, ExchangeError>;

    /// Latest ticker for a quoted pair (`BTCUSDT`)
    async fn ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    /// Quote converting `amount` of `from_asset` into `to_asset`
    async fn conversion_quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        amount: Decimal,
        wallet_type: &str,
    ) -> Result<ConversionQuote, ExchangeError>;

    /// Accept a quote. Irreversible once it returns `Ok`.
    async fn accept_quote(&self, quote_id: &str) -> Result<ConversionOrder, ExchangeError>;
}
