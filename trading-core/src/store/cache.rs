//! Key/value quote cache with per-symbol broadcast channels.

use super::poisoned;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::broadcast;
use trading::model::keys::{quote_channel, quote_key};
use trading::{Quote, QuoteCache, QuoteSubscription, StoreError};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Quote cache addressed by `market:<symbol>` keys, publishing every write on
/// `market_updates:<symbol>`.
pub struct MemoryQuoteCache {
    entries: RwLock<HashMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    channel_capacity: usize,
    writes: AtomicU64,
    publishes: AtomicU64,
}

impl Default for MemoryQuoteCache {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl MemoryQuoteCache {
    /// `channel_capacity` bounds how far a subscriber may lag before skipping.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
            writes: AtomicU64::new(0),
            publishes: AtomicU64::new(0),
        }
    }

    /// Number of cache writes performed so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of publishes issued so far.
    pub fn publishes(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }

    /// Live subscribers on the channel of `symbol`.
    pub fn subscriber_count(&self, symbol: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(&quote_channel(symbol)).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuoteCache for MemoryQuoteCache {
    async fn save_quote(&self, quote: &Quote) -> Result<(), StoreError> {
        let payload = serde_json::to_string(quote)?;

        // Set and publish under both locks: a subscriber joins either before the
        // publish or after the new value is readable.
        let mut entries = self.entries.write().map_err(poisoned)?;
        let mut channels = self.channels.lock().map_err(poisoned)?;
        entries.insert(quote_key(quote.symbol()), payload.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);

        let sender = channels
            .entry(quote_channel(quote.symbol()))
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        // No receivers is not an error for a best-effort publish.
        let delivered = sender.send(payload).unwrap_or(0);
        self.publishes.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Cached {} @ {} (published to {} subscribers)",
            quote.symbol(),
            quote.price(),
            delivered
        );
        Ok(())
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, StoreError> {
        let entries = self.entries.read().map_err(poisoned)?;
        match entries.get(&quote_key(symbol)) {
            Some(payload) => Ok(Some(serde_json::from_str(payload)?)),
            None => Ok(None),
        }
    }

    async fn subscribe(&self, symbol: &str) -> Result<QuoteSubscription, StoreError> {
        let mut channels = self.channels.lock().map_err(poisoned)?;
        let sender = channels
            .entry(quote_channel(symbol))
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        Ok(QuoteSubscription::new(symbol, sender.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::time::timeout;

    fn quote(price: rust_decimal::Decimal, ts: i64) -> Quote {
        Quote::new("AAPL", price, ts, "FH")
    }

    #[tokio::test]
    async fn test_get_before_first_write_is_not_warmed() {
        let cache = MemoryQuoteCache::default();
        assert!(cache.get_quote("AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_latest() {
        let cache = MemoryQuoteCache::default();
        cache.save_quote(&quote(dec!(150), 1)).await.unwrap();
        cache.save_quote(&quote(dec!(151.5), 2)).await.unwrap();

        let cached = cache.get_quote("AAPL").await.unwrap().unwrap();
        assert_eq!(cached.price(), dec!(151.5));
        assert_eq!(cached.timestamp(), 2);
        assert_eq!(cache.writes(), 2);
        assert_eq!(cache.publishes(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_are_independent() {
        let cache = MemoryQuoteCache::default();
        let mut first = cache.subscribe("AAPL").await.unwrap();
        let second = cache.subscribe("AAPL").await.unwrap();
        assert_eq!(cache.subscriber_count("AAPL"), 2);

        drop(second);
        assert_eq!(cache.subscriber_count("AAPL"), 1);

        cache.save_quote(&quote(dec!(150), 1)).await.unwrap();
        let received = timeout(Duration::from_secs(1), first.recv()).await.unwrap();
        assert_eq!(received.unwrap().price(), dec!(150));
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let cache = MemoryQuoteCache::default();
        cache.save_quote(&quote(dec!(150), 1)).await.unwrap();

        let mut late = cache.subscribe("AAPL").await.unwrap();
        assert!(timeout(Duration::from_millis(50), late.recv()).await.is_err());

        cache.save_quote(&quote(dec!(152), 2)).await.unwrap();
        let received = timeout(Duration::from_secs(1), late.recv()).await.unwrap();
        assert_eq!(received.unwrap().price(), dec!(152));
    }

    #[tokio::test]
    async fn test_channels_are_per_symbol() {
        let cache = MemoryQuoteCache::default();
        let mut btc = cache.subscribe("BINANCE:BTCUSDT").await.unwrap();
        cache.save_quote(&quote(dec!(150), 1)).await.unwrap();
        assert!(timeout(Duration::from_millis(50), btc.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_recent() {
        let cache = MemoryQuoteCache::new(2);
        let mut slow = cache.subscribe("AAPL").await.unwrap();
        for ts in 1..=5 {
            cache.save_quote(&quote(dec!(100), ts)).await.unwrap();
        }
        let received = timeout(Duration::from_secs(1), slow.recv()).await.unwrap().unwrap();
        assert_eq!(received.timestamp(), 4);
    }
}
