//! Testing utilities for strategies
//!
//! In-memory doubles for the exchange and notifier collaborators with failure
//! injection and call recording.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use types::{base_asset, is_quote_asset, Balance, ConversionOrder, ConversionQuote, Ticker, QUOTE_ASSET};

use crate::{Exchange, ExchangeError, Notifier, NotifyError};

#[derive(Debug)]
struct MockExchangeState {
    balances: HashMap<String, Decimal>,
    prices: HashMap<String, Decimal>,
    quotes: HashMap<String, ConversionQuote>,
    accepted: Vec<String>,
    issued: usize,
    quote_skew: Decimal,
    quote_limit: Option<Decimal>,
    fail_quotes: Option<ExchangeError>,
    fail_accepts: Option<ExchangeError>,
    next_id: u64,
}

/// Exchange double that prices quotes off its tickers
///
/// Quotes convert at `from_price / to_price`, multiplied by a configurable skew
/// so drift scenarios can be produced. Accepting a quote moves balances.
#[derive(Debug)]
pub struct MockExchange {
    state: Mutex<MockExchangeState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockExchangeState {
                balances: HashMap::new(),
                prices: HashMap::new(),
                quotes: HashMap::new(),
                accepted: Vec::new(),
                issued: 0,
                quote_skew: Decimal::ONE,
                quote_limit: None,
                fail_quotes: None,
                fail_accepts: None,
                next_id: 1,
            }),
        }
    }

    pub fn with_balance(self, asset: &str, amount: Decimal) -> Self {
        self.set_balance(asset, amount);
        self
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.state.lock().balances.insert(asset.to_string(), amount);
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.lock().prices.insert(symbol.to_string(), price);
    }

    /// Multiply quoted destination amounts (1 = fair, 0.95 = 5% short)
    pub fn set_quote_skew(&self, skew: Decimal) {
        self.state.lock().quote_skew = skew;
    }

    /// Quote at most `limit` of the requested amount, like a venue with
    /// limited depth
    pub fn limit_quotes_to(&self, limit: Option<Decimal>) {
        self.state.lock().quote_limit = limit;
    }

    pub fn fail_quotes_with(&self, error: Option<ExchangeError>) {
        self.state.lock().fail_quotes = error;
    }

    pub fn fail_accepts_with(&self, error: Option<ExchangeError>) {
        self.state.lock().fail_accepts = error;
    }

    pub fn balance_of(&self, asset: &str) -> Decimal {
        self.state
            .lock()
            .balances
            .get(asset)
            .copied()
            .unwrap_or_default()
    }

    pub fn accepted_quotes(&self) -> Vec<String> {
        self.state.lock().accepted.clone()
    }

    /// Quotes issued so far, accepted or not
    pub fn quote_count(&self) -> usize {
        self.state.lock().issued
    }

    fn asset_price(state: &MockExchangeState, asset: &str) -> Result<Decimal, ExchangeError> {
        if is_quote_asset(asset) {
            return Ok(Decimal::ONE);
        }
        state
            .prices
            .get(&format!("{}{}", asset, QUOTE_ASSET))
            .copied()
            .ok_or_else(|| ExchangeError::InvalidSymbol(asset.to_string()))
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
        Ok(Balance {
            asset: asset.to_string(),
            free: self.balance_of(asset),
            locked: Decimal::ZERO,
        })
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        if is_quote_asset(symbol) {
            return Ok(Ticker::unit(symbol));
        }
        let state = self.state.lock();
        let price = state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::InvalidSymbol(symbol.to_string()))?;
        Ok(Ticker {
            symbol: symbol.to_string(),
            price,
            volume: Decimal::ZERO,
            price_change_pct: Decimal::ZERO,
        })
    }

    async fn conversion_quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        amount: Decimal,
        _wallet_type: &str,
    ) -> Result<ConversionQuote, ExchangeError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_quotes.clone() {
            return Err(error);
        }
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidQuoteAmount);
        }
        let available = state.balances.get(from_asset).copied().unwrap_or_default();
        if amount > available {
            return Err(ExchangeError::InsufficientBalance);
        }
        let amount = state.quote_limit.map_or(amount, |limit| amount.min(limit));

        let from_price = Self::asset_price(&state, base_asset(from_asset))?;
        let to_price = Self::asset_price(&state, base_asset(to_asset))?;
        let to_amount = (amount * from_price)
            .checked_div(to_price)
            .ok_or(ExchangeError::InvalidQuoteAmount)?
            * state.quote_skew;

        let id = format!("mock-quote-{}", state.next_id);
        state.next_id += 1;
        let quote = ConversionQuote {
            id: id.clone(),
            from_asset: from_asset.to_string(),
            to_asset: to_asset.to_string(),
            from_amount: amount,
            to_amount,
            ratio: to_amount.checked_div(amount).unwrap_or_default(),
            inverse_ratio: amount.checked_div(to_amount).unwrap_or_default(),
            valid_time_secs: 10,
            fee: Decimal::ZERO,
            fee_asset: to_asset.to_string(),
        };
        state.quotes.insert(id, quote.clone());
        state.issued += 1;
        Ok(quote)
    }

    async fn accept_quote(&self, quote_id: &str) -> Result<ConversionOrder, ExchangeError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_accepts.clone() {
            return Err(error);
        }
        let quote = state
            .quotes
            .remove(quote_id)
            .ok_or(ExchangeError::QuoteExpired)?;

        let from = state.balances.entry(quote.from_asset.clone()).or_default();
        if *from < quote.from_amount {
            return Err(ExchangeError::InsufficientBalance);
        }
        *from -= quote.from_amount;
        *state.balances.entry(quote.to_asset.clone()).or_default() += quote.to_amount;
        state.accepted.push(quote.id.clone());

        let id = format!("mock-order-{}", state.next_id);
        state.next_id += 1;
        Ok(ConversionOrder {
            id,
            status: "SUCCESS".to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().push(text.to_string());
        Ok(())
    }
}

/// Notifier whose deliveries always fail
#[derive(Debug, Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_message(&self, _text: &str) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("notifier offline".to_string()))
    }
}
