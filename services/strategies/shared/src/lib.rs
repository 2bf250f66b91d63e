//! Shared Strategy Framework
//!
//! Common traits, collaborator interfaces and test doubles for trading strategy
//! implementations.

pub mod exchange;
pub mod metrics;
pub mod notifier;
pub mod testing;
pub mod traits;

pub use exchange::*;
pub use metrics::*;
pub use notifier::*;
pub use testing::*;
pub use traits::*;
