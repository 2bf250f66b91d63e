//! Symbol conventions
//!
//! Every traded symbol is a pair quoted in [`QUOTE_ASSET`] (`BTCUSDT`, `ETHUSDT`).
//! The quote asset itself is the unit of account and may appear as a bare symbol
//! on holdings parked after a stop-loss.

/// Unit-of-account asset every pair is quoted in
pub const QUOTE_ASSET: &str = "USDT";

/// True when `symbol` ends in the quote asset suffix
pub fn is_quoted_pair(symbol: &str) -> bool {
    symbol.ends_with(QUOTE_ASSET)
}

/// Base asset of a quoted pair (`BTCUSDT` -> `BTC`)
///
/// The bare quote asset maps to itself so balances for parked holdings are
/// looked up under `USDT`.
pub fn base_asset(symbol: &str) -> &str {
    match symbol.strip_suffix(QUOTE_ASSET) {
        Some(base) if !base.is_empty() => base,
        _ => symbol,
    }
}

/// True when `symbol` is the unit of account itself
pub fn is_quote_asset(symbol: &str) -> bool {
    symbol == QUOTE_ASSET
}
