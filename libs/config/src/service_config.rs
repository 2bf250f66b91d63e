//! Service Configuration Module
//!
//! Loads the opportunity service configuration from TOML files with
//! environment-specific overrides and `TORQ_` environment variables.
//!
//! Precedence, lowest first: built-in defaults, base file,
//! `config/environments/<env>.toml`, environment variables
//! (`TORQ_ENGINE__WINDOW_DAYS=30`).

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::service;

const DEFAULT_CONFIG_PATH: &str = "config/opportunity.toml";

/// Main service configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub trading: TradingConfig,
    pub bus: BusConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: service::logging::LEVEL.to_string(),
            json: false,
        }
    }
}

/// Candle window and ranking settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub window_days: u32,
    pub window_cap: usize,
    pub freshness_secs: u64,
    pub quote_asset: String,
    /// Judge freshness against the newest recomputed candle instead of the
    /// wall clock, for replaying recorded history
    pub market_clock: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_days: service::engine::WINDOW_DAYS,
            window_cap: service::engine::WINDOW_CAP,
            freshness_secs: service::engine::FRESHNESS_SECS,
            quote_asset: service::engine::QUOTE_ASSET.to_string(),
            market_clock: service::engine::MARKET_CLOCK,
        }
    }
}

/// Thresholds for one risk tier
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Profit% a pull-back must exceed before selling
    pub profit_pct: f64,
    /// Score the best-ranked symbol must exceed to rotate into it
    pub min_score: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RiskTiers {
    pub low: TierThresholds,
    pub medium: TierThresholds,
    pub high: TierThresholds,
}

impl Default for RiskTiers {
    fn default() -> Self {
        use service::trading::*;
        Self {
            low: TierThresholds {
                profit_pct: LOW_PROFIT_PCT,
                min_score: LOW_MIN_SCORE,
            },
            medium: TierThresholds {
                profit_pct: MEDIUM_PROFIT_PCT,
                min_score: MEDIUM_MIN_SCORE,
            },
            high: TierThresholds {
                profit_pct: HIGH_PROFIT_PCT,
                min_score: HIGH_MIN_SCORE,
            },
        }
    }
}

/// Decision engine settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TradingConfig {
    pub wallet_type: String,
    /// Maximum tolerated conversion drift as a fraction
    pub max_drift: f64,
    pub settlement_retries: u32,
    pub settlement_backoff_ms: u64,
    /// Evaluate open positions after each scored recompute
    pub decide_on_score: bool,
    pub tiers: RiskTiers,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            wallet_type: service::trading::WALLET_TYPE.to_string(),
            max_drift: service::trading::MAX_DRIFT,
            settlement_retries: service::trading::SETTLEMENT_RETRIES,
            settlement_backoff_ms: service::trading::SETTLEMENT_BACKOFF_MS,
            decide_on_score: true,
            tiers: RiskTiers::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BusConfig {
    pub market_data_subject: String,
    pub dlq_subject: String,
    /// Queued deliveries per subscriber before publishes warn
    pub queue_high_water: usize,
    /// Published messages retained for inspection
    pub history_limit: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            market_data_subject: service::bus::MARKET_DATA_SUBJECT.to_string(),
            dlq_subject: service::bus::DLQ_SUBJECT.to_string(),
            queue_high_water: service::bus::QUEUE_HIGH_WATER,
            history_limit: service::bus::HISTORY_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from files with environment overrides
    ///
    /// An explicit `base_path` must exist; the default path is optional so the
    /// service starts on defaults alone.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = match base_path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false),
        };

        let mut builder = Config::builder().add_source(base);

        if let Some(env) = environment {
            let env_file = PathBuf::from("config/environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // Override with environment variables (TORQ_SECTION__FIELD)
        builder = builder.add_source(
            Environment::with_prefix("TORQ")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Render the effective configuration
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Expand environment variables in string values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        for (name, value) in [
            ("market data subject", &mut self.bus.market_data_subject),
            ("dead-letter subject", &mut self.bus.dlq_subject),
            ("wallet type", &mut self.trading.wallet_type),
        ] {
            let expanded = shellexpand::env(value.as_str())
                .with_context(|| format!("Failed to expand {}", name))?
                .to_string();
            if expanded != *value {
                debug!("Expanded {}: {} -> {}", name, value, expanded);
                *value = expanded;
            }
        }

        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.window_days == 0 {
            bail!("engine.window_days must be positive");
        }
        if self.engine.window_cap == 0 {
            bail!("engine.window_cap must be positive");
        }
        if self.engine.freshness_secs == 0 {
            bail!("engine.freshness_secs must be positive");
        }
        if self.engine.quote_asset.is_empty() {
            bail!("engine.quote_asset must not be empty");
        }
        if !(self.trading.max_drift > 0.0 && self.trading.max_drift < 1.0) {
            bail!(
                "trading.max_drift must be in (0, 1), got {}",
                self.trading.max_drift
            );
        }
        for (tier, thresholds) in [
            ("low", self.trading.tiers.low),
            ("medium", self.trading.tiers.medium),
            ("high", self.trading.tiers.high),
        ] {
            if thresholds.profit_pct < 0.0 || thresholds.min_score < 0.0 {
                bail!("trading.tiers.{} thresholds must not be negative", tier);
            }
        }
        if self.bus.market_data_subject.is_empty() || self.bus.dlq_subject.is_empty() {
            bail!("bus subjects must not be empty");
        }
        if self.bus.market_data_subject == self.bus.dlq_subject {
            bail!("bus.dlq_subject must differ from bus.market_data_subject");
        }
        if self.bus.queue_high_water == 0 {
            bail!("bus.queue_high_water must be positive");
        }
        if self.bus.history_limit == 0 {
            bail!("bus.history_limit must be positive");
        }
        Ok(())
    }
}

/// Convenience function to load, expand and validate configuration
pub fn load_config(path: Option<&Path>, environment: Option<&str>) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(path, environment)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}
