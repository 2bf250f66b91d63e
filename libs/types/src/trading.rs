//! Trading entities: preferences, holdings, orders and rankings
//!
//! Money values are [`Decimal`]; scores stay `f64` because they come out of the
//! indicator pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{base_asset, is_quote_asset, is_quoted_pair, ValidationError};

/// Risk tier controlling profit and attractiveness thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(ValidationError::UnknownVariant {
                kind: "risk level",
                value: other.to_string(),
            }),
        }
    }
}

/// Trading style tag on a preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    SwingTrading,
    Scalping,
    DayTrading,
}

impl FromStr for Algorithm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swing_trading" => Ok(Algorithm::SwingTrading),
            "scalping" => Ok(Algorithm::Scalping),
            "day_trading" => Ok(Algorithm::DayTrading),
            other => Err(ValidationError::UnknownVariant {
                kind: "algorithm",
                value: other.to_string(),
            }),
        }
    }
}

/// Per-user automated trading settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub algorithm: Algorithm,
    /// Ordered set of candidate symbols for rotation
    pub watchlist: Vec<String>,
    pub operate: bool,
    pub stop_loss_enabled: bool,
    pub stop_loss_exit_enabled: bool,
    pub risk_level: RiskLevel,
    /// Wallet passed to conversion quotes
    #[serde(default = "default_wallet_type")]
    pub wallet_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_wallet_type() -> String {
    "spot".to_string()
}

impl TradingPreference {
    /// Operating preference with stop-loss enabled and a spot wallet
    pub fn new(
        user_id: Uuid,
        algorithm: Algorithm,
        risk_level: RiskLevel,
        watchlist: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let now = Utc::now();
        let mut preference = Self {
            id: Uuid::new_v4(),
            user_id,
            algorithm,
            watchlist: Vec::new(),
            operate: true,
            stop_loss_enabled: true,
            stop_loss_exit_enabled: false,
            risk_level,
            wallet_type: default_wallet_type(),
            created_at: now,
            updated_at: now,
        };
        for symbol in watchlist {
            preference.watch(symbol);
        }
        preference
    }

    /// Append to the watchlist keeping set semantics and insertion order
    pub fn watch(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if !self.watchlist.contains(&symbol) {
            self.watchlist.push(symbol);
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(bad) = self.watchlist.iter().find(|s| !is_quoted_pair(s)) {
            return Err(ValidationError::InvalidWatchlistElement(bad.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldingStatus {
    Open,
    Closed,
}

/// A position in one asset owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub profit: Decimal,
    /// Opportunity score of the symbol when the holding was opened
    pub entry_score: f64,
    pub status: HoldingStatus,
    /// Order whose settlement opened this holding
    pub origin_order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn open(
        user_id: Uuid,
        symbol: impl Into<String>,
        quantity: Decimal,
        entry_price: Decimal,
        entry_score: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol: symbol.into(),
            quantity,
            entry_price,
            exit_price: Decimal::ZERO,
            profit: Decimal::ZERO,
            entry_score,
            status: HoldingStatus::Open,
            origin_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_origin_order(mut self, order_id: Uuid) -> Self {
        self.origin_order_id = Some(order_id);
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == HoldingStatus::Open
    }

    /// Asset whose balance backs this holding
    pub fn asset(&self) -> &str {
        base_asset(&self.symbol)
    }

    /// Close at `exit_price`, recording and returning the realized profit
    pub fn close(&mut self, exit_price: Decimal) -> Decimal {
        self.exit_price = exit_price;
        self.profit = (exit_price - self.entry_price) * self.quantity;
        self.status = HoldingStatus::Closed;
        self.updated_at = Utc::now();
        self.profit
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        const ENTITY: &str = "holding";
        if !is_quoted_pair(&self.symbol) && !is_quote_asset(&self.symbol) {
            return Err(ValidationError::InvalidSymbol {
                entity: ENTITY,
                symbol: self.symbol.clone(),
            });
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("entry price", self.entry_price),
            ("exit price", self.exit_price),
        ] {
            if value < Decimal::ZERO {
                return Err(ValidationError::negative(ENTITY, field, value));
            }
        }
        if !self.entry_score.is_finite() {
            return Err(ValidationError::NotFinite {
                entity: ENTITY,
                field: "entry score",
            });
        }
        if self.entry_score < 0.0 {
            return Err(ValidationError::negative(ENTITY, "entry score", self.entry_score));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, settlement pending
    Open,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    StopLoss,
    TakeProfit,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::StopLoss => "stop_loss",
            TradeType::TakeProfit => "take_profit",
        }
    }
}

/// Inputs for a new settlement order
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub user_id: Uuid,
    /// Destination symbol
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub trade_type: TradeType,
    pub source_holding_id: Uuid,
    pub source_price: Decimal,
    pub entry_score: f64,
}

/// Conversion order tracked through settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub trade_type: TradeType,
    /// Holding closed by this order
    pub source_holding_id: Uuid,
    /// Exit price for the source holding
    pub source_price: Decimal,
    /// Entry score for the destination holding
    pub entry_score: f64,
    /// Exchange conversion id, set once the quote is accepted
    pub exchange_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(config: OrderConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: config.user_id,
            symbol: config.symbol,
            quantity: config.quantity,
            price: config.price,
            status: OrderStatus::Open,
            trade_type: config.trade_type,
            source_holding_id: config.source_holding_id,
            source_price: config.source_price,
            entry_score: config.entry_score,
            exchange_order_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn mark_accepted(&mut self, exchange_order_id: impl Into<String>) {
        self.exchange_order_id = Some(exchange_order_id.into());
        self.updated_at = Utc::now();
    }

    pub fn mark_filled(&mut self) {
        self.status = OrderStatus::Filled;
        self.updated_at = Utc::now();
    }

    pub fn mark_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        const ENTITY: &str = "order";
        for (field, value) in [("quantity", self.quantity), ("price", self.price)] {
            if value < Decimal::ZERO {
                return Err(ValidationError::negative(ENTITY, field, value));
            }
        }
        Ok(())
    }
}

/// Ranked opportunity score for one watchlist symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolScore {
    pub symbol: String,
    pub score: f64,
    /// 1 is best
    pub rank: usize,
}

/// Open holding joined with its owner's operating preference
#[derive(Debug, Clone, PartialEq)]
pub struct TradingPosition {
    pub holding: Holding,
    pub preference: TradingPreference,
}
