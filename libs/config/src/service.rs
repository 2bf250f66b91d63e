//! Service defaults
//!
//! Default values used when a configuration file or environment override does
//! not set a field.

/// Candle window and freshness defaults
pub mod engine {
    /// Trailing window used for indicator recomputation (days)
    pub const WINDOW_DAYS: u32 = 15;

    /// Maximum points loaded into one recompute window
    pub const WINDOW_CAP: usize = 1000;

    /// Maximum age of a point used for ranking (seconds)
    pub const FRESHNESS_SECS: u64 = 120;

    /// Unit-of-account asset
    pub const QUOTE_ASSET: &str = "USDT";

    /// Freshness is measured against the wall clock unless enabled
    pub const MARKET_CLOCK: bool = false;
}

/// Decision engine defaults
pub mod trading {
    pub const WALLET_TYPE: &str = "spot";

    /// Maximum tolerated conversion drift (fraction, 0.01 = 1%)
    pub const MAX_DRIFT: f64 = 0.01;

    /// Attempts for post-acceptance settlement steps
    pub const SETTLEMENT_RETRIES: u32 = 3;

    /// Base backoff between settlement attempts (milliseconds)
    pub const SETTLEMENT_BACKOFF_MS: u64 = 200;

    /// Profit% a pull-back must exceed before selling, per risk tier
    pub const LOW_PROFIT_PCT: f64 = 5.0;
    pub const MEDIUM_PROFIT_PCT: f64 = 10.0;
    pub const HIGH_PROFIT_PCT: f64 = 13.0;

    /// Score the rank-1 symbol must exceed to be attractive, per risk tier
    pub const LOW_MIN_SCORE: f64 = 0.8;
    pub const MEDIUM_MIN_SCORE: f64 = 0.7;
    pub const HIGH_MIN_SCORE: f64 = 0.5;
}

/// Event bus defaults
pub mod bus {
    pub const MARKET_DATA_SUBJECT: &str = "market.candles";

    pub const DLQ_SUBJECT: &str = "market.candles.dlq";

    /// Queued deliveries per subscriber before publishes warn about backpressure
    pub const QUEUE_HIGH_WATER: usize = 10_000;

    /// Published messages and settlements the in-memory bus retains
    pub const HISTORY_LIMIT: usize = 10_000;
}

/// Logging defaults
pub mod logging {
    pub const LEVEL: &str = "info";
}
