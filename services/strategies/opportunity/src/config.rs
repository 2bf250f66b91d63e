//! Strategy configuration

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use service_config::{ServiceConfig, TierThresholds};
use types::{RiskLevel, QUOTE_ASSET};

use crate::error::{Result, StrategyError};

/// Sell and rotation thresholds for one risk tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Profit% a pull-back must exceed to sell
    pub sell_profit_pct: Decimal,
    /// Score the rank-1 symbol must exceed to be attractive
    pub min_score: f64,
}

impl TierPolicy {
    fn from_thresholds(tier: &str, thresholds: &TierThresholds) -> Result<Self> {
        let sell_profit_pct =
            Decimal::try_from(thresholds.profit_pct).map_err(|e| StrategyError::Configuration {
                message: format!("{} tier profit_pct {}: {}", tier, thresholds.profit_pct, e),
            })?;
        Ok(Self {
            sell_profit_pct,
            min_score: thresholds.min_score,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Trailing recompute window (days)
    pub window_days: u32,

    /// Maximum points per recompute window
    pub window_cap: usize,

    /// Maximum age of a ranked point
    pub freshness: Duration,

    /// Age points against the newest recomputed candle rather than `Utc::now()`
    pub market_clock: bool,

    /// Maximum drift of a quote above the ticker-implied value
    pub max_drift: Decimal,

    /// Attempts for the idempotent post-acceptance settlement steps
    pub settlement_retries: u32,

    /// Base delay between settlement attempts, doubled per attempt
    pub settlement_backoff: Duration,

    /// Evaluate open positions in a symbol after it is rescored
    pub decide_on_score: bool,

    /// Wallet used when a preference does not name one
    pub wallet_type: String,

    pub low: TierPolicy,
    pub medium: TierPolicy,
    pub high: TierPolicy,

    /// Subject carrying market events (in and self-emitted)
    pub market_data_subject: String,

    /// Subject receiving failed events
    pub dlq_subject: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            window_days: 15,
            window_cap: 1000,
            freshness: Duration::from_secs(120),
            market_clock: false,
            max_drift: dec!(0.01), // 1%
            settlement_retries: 3,
            settlement_backoff: Duration::from_millis(200),
            decide_on_score: true,
            wallet_type: "spot".to_string(),
            low: TierPolicy {
                sell_profit_pct: dec!(5),
                min_score: 0.8,
            },
            medium: TierPolicy {
                sell_profit_pct: dec!(10),
                min_score: 0.7,
            },
            high: TierPolicy {
                sell_profit_pct: dec!(13),
                min_score: 0.5,
            },
            market_data_subject: "market.candles".to_string(),
            dlq_subject: "market.candles.dlq".to_string(),
        }
    }
}

impl StrategyConfig {
    /// Derive the strategy settings from the loaded service configuration
    pub fn from_service_config(service: &ServiceConfig) -> Result<Self> {
        if service.engine.quote_asset != QUOTE_ASSET {
            return Err(StrategyError::Configuration {
                message: format!(
                    "unsupported quote asset {}, symbols are quoted in {}",
                    service.engine.quote_asset, QUOTE_ASSET
                ),
            });
        }
        let max_drift =
            Decimal::try_from(service.trading.max_drift).map_err(|e| StrategyError::Configuration {
                message: format!("max_drift {}: {}", service.trading.max_drift, e),
            })?;

        let tiers = &service.trading.tiers;
        let config = Self {
            window_days: service.engine.window_days,
            window_cap: service.engine.window_cap,
            freshness: Duration::from_secs(service.engine.freshness_secs),
            market_clock: service.engine.market_clock,
            max_drift,
            settlement_retries: service.trading.settlement_retries,
            settlement_backoff: Duration::from_millis(service.trading.settlement_backoff_ms),
            decide_on_score: service.trading.decide_on_score,
            wallet_type: service.trading.wallet_type.clone(),
            low: TierPolicy::from_thresholds("low", &tiers.low)?,
            medium: TierPolicy::from_thresholds("medium", &tiers.medium)?,
            high: TierPolicy::from_thresholds("high", &tiers.high)?,
            market_data_subject: service.bus.market_data_subject.clone(),
            dlq_subject: service.bus.dlq_subject.clone(),
        };
        config.check()?;
        Ok(config)
    }

    pub fn tier(&self, risk: RiskLevel) -> &TierPolicy {
        match risk {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
        }
    }

    /// `window_days` as a chrono span for store queries
    pub fn window_span(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.window_days))
    }

    fn check(&self) -> Result<()> {
        if self.window_cap == 0 {
            return Err(StrategyError::Configuration {
                message: "window_cap must be positive".to_string(),
            });
        }
        if self.max_drift < Decimal::ZERO {
            return Err(StrategyError::Configuration {
                message: "max_drift must not be negative".to_string(),
            });
        }
        if self.settlement_retries == 0 {
            return Err(StrategyError::Configuration {
                message: "settlement_retries must be at least 1".to_string(),
            });
        }
        if self.market_data_subject == self.dlq_subject {
            return Err(StrategyError::Configuration {
                message: "dead-letter subject must differ from the market data subject".to_string(),
            });
        }
        Ok(())
    }
}

impl torq_strategy_shared::StrategyConfig for StrategyConfig {
    fn validate(&self) -> anyhow::Result<()> {
        self.check().map_err(anyhow::Error::from)
    }
}
