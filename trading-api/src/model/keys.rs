//! Key and channel naming shared by every store engine.
//!
//! Quote entries and their broadcast channels are addressed by symbol.

pub const QUOTE_KEY_PREFIX: &str = "market:";
pub const QUOTE_CHANNEL_PREFIX: &str = "market_updates:";

/// Cache key holding the latest quote of `symbol`.
pub fn quote_key(symbol: &str) -> String {
    format!("{QUOTE_KEY_PREFIX}{symbol}")
}

/// Broadcast channel carrying updates of `symbol`.
pub fn quote_channel(symbol: &str) -> String {
    format!("{QUOTE_CHANNEL_PREFIX}{symbol}")
}
