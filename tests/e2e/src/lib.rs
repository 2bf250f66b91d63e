//! End-to-End Test Framework for the Opportunity Pipeline
//!
//! Drives the complete strategy through the in-memory bus: candle events go in
//! as bytes on the market data subject, and scenarios assert on stored candle
//! points, holdings, orders, notifications and dead letters once the bus has
//! drained.

pub mod fixtures;
pub mod framework;

pub use fixtures::*;
pub use framework::{init_test_logging, TestHarness, DEFAULT_SETTLE_TIMEOUT};
