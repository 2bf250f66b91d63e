//! Shared building blocks: validation errors and symbol helpers

pub mod errors;
pub mod symbols;

pub use errors::ValidationError;
pub use symbols::{base_asset, is_quote_asset, is_quoted_pair, QUOTE_ASSET};
