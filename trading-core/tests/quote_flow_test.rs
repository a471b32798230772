//! Cache writes reaching stream consumers through the market facade.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trading::{MarketDataError, Quote, QuoteCache};
use trading_core::clock::now_secs;
use trading_core::comms::{deliver_quotes, DeliveryEnd, StreamEvent};
use trading_core::store::MemoryQuoteCache;
use trading_core::MarketData;

#[tokio::test]
async fn test_published_quotes_reach_every_stream() {
    let cache = Arc::new(MemoryQuoteCache::default());
    let market = MarketData::new(cache.clone(), ["AAPL"], Duration::from_secs(1800));
    let cancel = CancellationToken::new();

    let mut streams = Vec::new();
    for _ in 0..3 {
        let subscription = market.subscribe("AAPL").await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(deliver_quotes(
            subscription,
            tx,
            Duration::from_secs(15),
            cancel.clone(),
        ));
        streams.push((rx, task));
    }
    assert_eq!(cache.subscriber_count("AAPL"), 3);

    let quote = Quote::new("AAPL", dec!(187.44), now_secs(), "FH");
    cache.save_quote(&quote).await.unwrap();

    for (rx, _) in streams.iter_mut() {
        assert_eq!(rx.recv().await, Some(StreamEvent::Quote(quote.clone())));
    }

    // One client leaving does not disturb the others.
    let (rx, task) = streams.remove(0);
    drop(rx);
    assert_eq!(task.await.unwrap(), DeliveryEnd::ClientGone);

    let next = Quote::new("AAPL", dec!(187.50), now_secs(), "FH");
    cache.save_quote(&next).await.unwrap();
    for (rx, _) in streams.iter_mut() {
        assert_eq!(rx.recv().await, Some(StreamEvent::Quote(next.clone())));
    }

    cancel.cancel();
    for (_, task) in streams {
        assert_eq!(task.await.unwrap(), DeliveryEnd::Cancelled);
    }

    let view = market.get_quote("AAPL").await.unwrap();
    assert_eq!(view.quote, next);
    assert!(!view.is_stale);
}

#[tokio::test]
async fn test_late_subscriber_reads_cache_instead_of_replay() {
    let cache = Arc::new(MemoryQuoteCache::default());
    let market = MarketData::new(cache.clone(), ["AAPL"], Duration::from_secs(1800));
    assert!(matches!(
        market.get_quote("AAPL").await,
        Err(MarketDataError::NotWarmed(_))
    ));

    cache
        .save_quote(&Quote::new("AAPL", dec!(150), now_secs(), "FH"))
        .await
        .unwrap();

    let mut subscription = market.subscribe("AAPL").await.unwrap();
    let pending = tokio::time::timeout(Duration::from_millis(20), subscription.recv()).await;
    assert!(pending.is_err());
    assert_eq!(market.get_quote("AAPL").await.unwrap().quote.price(), dec!(150));
}
