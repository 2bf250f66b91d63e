//! # Torq Service Configuration
//!
//! Layered configuration for the opportunity rotation service.
//!
//! ## Features
//!
//! - **Defaults**: every field has a default in [`service`], so an empty file is valid
//! - **Layering**: base TOML file, environment file, then `TORQ_` variables
//! - **Validation**: [`ServiceConfig::validate`] rejects settings the engine cannot run with
//!
//! ## Usage
//!
//! ```rust,no_run
//! use service_config::load_config;
//!
//! let config = load_config(None, Some("production")).unwrap();
//! println!("window: {} days", config.engine.window_days);
//! ```

pub mod service;
pub mod service_config;

// Re-export commonly used types
pub use service_config::{
    load_config, BusConfig, EngineConfig, LoggingConfig, RiskTiers, ServiceConfig, TierThresholds,
    TradingConfig,
};
