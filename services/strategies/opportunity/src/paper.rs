//! Paper exchange
//!
//! Fills conversions at the latest candle close of each asset's pair so the
//! service binary can run the full decision path without a venue. Recorded
//! history needs `--market-clock`, otherwise every replayed symbol is stale.
//! Balances live in memory and are seeded from a portfolio file.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use state_trading::{CandleStore, HoldingStore, PreferenceStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use torq_strategy_shared::{Exchange, ExchangeError};
use tracing::debug;
use types::{
    base_asset, is_quote_asset, Algorithm, Balance, ConversionOrder, ConversionQuote, Holding,
    RiskLevel, Ticker, TradingPreference, QUOTE_ASSET,
};
use uuid::Uuid;

use crate::error::Result;

const QUOTE_VALIDITY_SECS: u64 = 10;

#[derive(Debug)]
struct PendingQuote {
    quote: ConversionQuote,
    issued: Instant,
}

#[derive(Debug)]
pub struct PaperExchange {
    candles: Arc<dyn CandleStore>,
    balances: DashMap<String, Decimal>,
    quotes: DashMap<String, PendingQuote>,
    quote_validity: Duration,
    next_id: AtomicU64,
}

impl PaperExchange {
    pub fn new(candles: Arc<dyn CandleStore>) -> Self {
        Self {
            candles,
            balances: DashMap::new(),
            quotes: DashMap::new(),
            quote_validity: Duration::from_secs(QUOTE_VALIDITY_SECS),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_quote_validity(mut self, validity: Duration) -> Self {
        self.quote_validity = validity;
        self
    }

    /// Add `amount` to the free balance of `asset`
    pub fn deposit(&self, asset: &str, amount: Decimal) {
        *self.balances.entry(asset.to_string()).or_default() += amount;
    }

    pub fn balance_of(&self, asset: &str) -> Decimal {
        self.balances.get(asset).map(|b| *b).unwrap_or_default()
    }

    async fn asset_price(&self, asset: &str) -> std::result::Result<Decimal, ExchangeError> {
        if is_quote_asset(asset) {
            return Ok(Decimal::ONE);
        }
        let symbol = format!("{}{}", asset, QUOTE_ASSET);
        self.ticker(&symbol).await.map(|t| t.price)
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn balance(&self, asset: &str) -> std::result::Result<Balance, ExchangeError> {
        Ok(Balance {
            asset: asset.to_string(),
            free: self.balance_of(asset),
            locked: Decimal::ZERO,
        })
    }

    async fn ticker(&self, symbol: &str) -> std::result::Result<Ticker, ExchangeError> {
        if is_quote_asset(symbol) {
            return Ok(Ticker::unit(symbol));
        }
        let latest = self
            .candles
            .latest(symbol)
            .await
            .map_err(|e| ExchangeError::from_message(&e.to_string()))?
            .ok_or_else(|| ExchangeError::InvalidSymbol(symbol.to_string()))?;
        let price = Decimal::try_from(latest.close)
            .map_err(|_| ExchangeError::InvalidSymbol(symbol.to_string()))?;
        let volume = Decimal::try_from(latest.volume).unwrap_or_default();
        Ok(Ticker {
            symbol: symbol.to_string(),
            price,
            volume,
            price_change_pct: Decimal::ZERO,
        })
    }

    async fn conversion_quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        amount: Decimal,
        _wallet_type: &str,
    ) -> std::result::Result<ConversionQuote, ExchangeError> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidQuoteAmount);
        }
        if amount > self.balance_of(from_asset) {
            return Err(ExchangeError::InsufficientBalance);
        }
        let from_price = self.asset_price(base_asset(from_asset)).await?;
        let to_price = self.asset_price(base_asset(to_asset)).await?;
        let to_amount = (amount * from_price)
            .checked_div(to_price)
            .ok_or(ExchangeError::InvalidQuoteAmount)?;

        let id = format!("paper-quote-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let quote = ConversionQuote {
            id: id.clone(),
            from_asset: from_asset.to_string(),
            to_asset: to_asset.to_string(),
            from_amount: amount,
            to_amount,
            ratio: to_amount.checked_div(amount).unwrap_or_default(),
            inverse_ratio: amount.checked_div(to_amount).unwrap_or_default(),
            valid_time_secs: self.quote_validity.as_secs(),
            fee: Decimal::ZERO,
            fee_asset: to_asset.to_string(),
        };
        self.quotes.insert(
            id,
            PendingQuote {
                quote: quote.clone(),
                issued: Instant::now(),
            },
        );
        Ok(quote)
    }

    async fn accept_quote(&self, quote_id: &str) -> std::result::Result<ConversionOrder, ExchangeError> {
        let (_, pending) = self
            .quotes
            .remove(quote_id)
            .ok_or(ExchangeError::QuoteExpired)?;
        if pending.issued.elapsed() > self.quote_validity {
            return Err(ExchangeError::QuoteExpired);
        }
        let quote = pending.quote;

        {
            let mut from = self.balances.entry(quote.from_asset.clone()).or_default();
            if *from < quote.from_amount {
                return Err(ExchangeError::InsufficientBalance);
            }
            *from -= quote.from_amount;
        }
        self.deposit(&quote.to_asset, quote.to_amount);
        debug!(
            quote_id,
            from = %quote.from_asset,
            to = %quote.to_asset,
            amount = %quote.from_amount,
            "paper conversion filled"
        );

        Ok(ConversionOrder {
            id: format!("paper-order-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
            status: "SUCCESS".to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Starting portfolio for a paper run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperPortfolio {
    #[serde(default)]
    pub users: Vec<PaperUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperUser {
    #[serde(default = "Uuid::new_v4")]
    pub user_id: Uuid,
    pub risk_level: RiskLevel,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    pub watchlist: Vec<String>,
    #[serde(default = "default_true")]
    pub stop_loss_enabled: bool,
    #[serde(default)]
    pub holdings: Vec<PaperHolding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperHolding {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    #[serde(default)]
    pub entry_score: f64,
}

fn default_algorithm() -> Algorithm {
    Algorithm::SwingTrading
}

fn default_true() -> bool {
    true
}

impl PaperPortfolio {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write preferences and holdings, and deposit each holding's quantity
    pub async fn seed(
        &self,
        preferences: &dyn PreferenceStore,
        holdings: &dyn HoldingStore,
        exchange: &PaperExchange,
    ) -> Result<usize> {
        let mut seeded = 0;
        for user in &self.users {
            let mut preference = TradingPreference::new(
                user.user_id,
                user.algorithm,
                user.risk_level,
                user.watchlist.iter().cloned(),
            );
            preference.stop_loss_enabled = user.stop_loss_enabled;
            preferences.upsert(preference).await?;

            for entry in &user.holdings {
                let holding = Holding::open(
                    user.user_id,
                    entry.symbol.clone(),
                    entry.quantity,
                    entry.entry_price,
                    entry.entry_score,
                );
                exchange.deposit(holding.asset(), entry.quantity);
                holdings.insert(holding).await?;
                seeded += 1;
            }
        }
        Ok(seeded)
    }
}
