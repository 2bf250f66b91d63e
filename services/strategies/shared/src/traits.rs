//! Strategy traits and interfaces

use anyhow::Result;
use async_trait::async_trait;

/// Core strategy trait that all trading strategies must implement
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Strategy name for identification
    fn name(&self) -> &'static str;

    /// Start the strategy
    async fn start(&mut self) -> Result<()>;

    /// Stop the strategy
    async fn stop(&mut self) -> Result<()>;

    /// Get current strategy metrics
    fn metrics(&self) -> StrategyMetrics;
}

/// Strategy metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyMetrics {
    pub messages_processed: u64,
    pub candles_ingested: u64,
    pub duplicates_skipped: u64,
    pub partial_candles_dropped: u64,
    pub recomputes: u64,
    pub scores_written: u64,
    pub signals_generated: u64,
    pub rotations: u64,
    pub stop_losses: u64,
    pub errors: u64,
}

impl StrategyMetrics {
    /// Trades executed of either kind
    pub fn trades_executed(&self) -> u64 {
        self.rotations + self.stop_losses
    }
}

/// Strategy configuration trait
pub trait StrategyConfig: Send + Sync + Clone {
    /// Validate configuration
    fn validate(&self) -> Result<()>;
}
