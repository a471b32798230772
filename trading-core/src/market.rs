//! Read side of the quote cache.
//!
//! [`MarketData`] applies the tracked-symbol allow-list before touching the cache
//! and attaches the staleness flag at read time. An empty allow-list tracks every
//! symbol.

use crate::clock::now_secs;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use trading::{MarketDataError, QuoteCache, QuoteSubscription, QuoteView};

#[derive(Clone)]
pub struct MarketData {
    cache: Arc<dyn QuoteCache>,
    tracked: Arc<BTreeSet<String>>,
    staleness_window: Duration,
}

impl MarketData {
    pub fn new<I, S>(cache: Arc<dyn QuoteCache>, tracked: I, staleness_window: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache,
            tracked: Arc::new(tracked.into_iter().map(Into::into).collect()),
            staleness_window,
        }
    }

    pub fn is_tracked(&self, symbol: &str) -> bool {
        self.tracked.is_empty() || self.tracked.contains(symbol)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(String::as_str)
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    pub fn cache(&self) -> &Arc<dyn QuoteCache> {
        &self.cache
    }

    fn check_tracked(&self, symbol: &str) -> Result<(), MarketDataError> {
        if self.is_tracked(symbol) {
            Ok(())
        } else {
            Err(MarketDataError::SymbolNotAllowed(symbol.to_string()))
        }
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<QuoteView, MarketDataError> {
        self.get_quote_at(symbol, now_secs()).await
    }

    /// Like [`MarketData::get_quote`], with staleness judged at `now`.
    pub async fn get_quote_at(&self, symbol: &str, now: i64) -> Result<QuoteView, MarketDataError> {
        self.check_tracked(symbol)?;
        match self.cache.get_quote(symbol).await? {
            Some(quote) => Ok(quote.view(now, self.staleness_window)),
            None => Err(MarketDataError::NotWarmed(symbol.to_string())),
        }
    }

    pub async fn subscribe(&self, symbol: &str) -> Result<QuoteSubscription, MarketDataError> {
        self.check_tracked(symbol)?;
        Ok(self.cache.subscribe(symbol).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryQuoteCache;
    use rust_decimal_macros::dec;
    use trading::Quote;

    fn market(cache: Arc<MemoryQuoteCache>) -> MarketData {
        MarketData::new(cache, ["AAPL", "BINANCE:BTCUSDT"], Duration::from_secs(1800))
    }

    #[tokio::test]
    async fn test_untracked_symbol_is_rejected_before_cache() {
        let market = market(Arc::new(MemoryQuoteCache::default()));
        assert!(matches!(
            market.get_quote("TSLA").await,
            Err(MarketDataError::SymbolNotAllowed(_))
        ));
        assert!(matches!(
            market.subscribe("TSLA").await,
            Err(MarketDataError::SymbolNotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_not_warmed_is_distinct() {
        let market = market(Arc::new(MemoryQuoteCache::default()));
        assert!(matches!(
            market.get_quote("AAPL").await,
            Err(MarketDataError::NotWarmed(_))
        ));
    }

    #[tokio::test]
    async fn test_staleness_computed_at_read_time() {
        let cache = Arc::new(MemoryQuoteCache::default());
        cache
            .save_quote(&Quote::new("AAPL", dec!(150), 1_000, "FH"))
            .await
            .unwrap();
        let market = market(cache);

        let fresh = market.get_quote_at("AAPL", 1_000 + 1800).await.unwrap();
        assert!(!fresh.is_stale);
        let stale = market.get_quote_at("AAPL", 1_000 + 1801).await.unwrap();
        assert!(stale.is_stale);
        assert_eq!(stale.quote.price(), dec!(150));
    }

    #[tokio::test]
    async fn test_empty_allow_list_tracks_everything() {
        let market = MarketData::new(
            Arc::new(MemoryQuoteCache::default()),
            Vec::<String>::new(),
            Duration::from_secs(60),
        );
        assert!(market.is_tracked("ANY"));
    }
}
