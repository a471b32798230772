//! Latest-quote cache with per-symbol broadcast.

use crate::error::StoreError;
use crate::model::quote::Quote;
use async_trait::async_trait;
use log::warn;
use tokio::sync::broadcast;

/// Holds one quote per symbol and publishes every overwrite.
#[async_trait]
pub trait QuoteCache: Send + Sync {
    /// Overwrites the cached quote and publishes it on the symbol's channel as
    /// one operation.
    async fn save_quote(&self, quote: &Quote) -> Result<(), StoreError>;

    /// Returns the cached quote, or `None` when the symbol has not been written yet.
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, StoreError>;

    /// Opens an independent subscription to the symbol's channel.
    ///
    /// Only quotes published after this call are delivered.
    async fn subscribe(&self, symbol: &str) -> Result<QuoteSubscription, StoreError>;
}

/// A live handle on one symbol's channel. Dropping it unsubscribes.
pub struct QuoteSubscription {
    symbol: String,
    receiver: broadcast::Receiver<String>,
}

impl QuoteSubscription {
    pub fn new(symbol: impl Into<String>, receiver: broadcast::Receiver<String>) -> Self {
        Self {
            symbol: symbol.into(),
            receiver,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Waits for the next published quote.
    ///
    /// Returns `None` once the channel is closed. Messages missed by a lagging
    /// subscriber are skipped.
    pub async fn recv(&mut self) -> Option<Quote> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => match serde_json::from_str::<Quote>(&payload) {
                    Ok(quote) => return Some(quote),
                    Err(e) => warn!("Dropping malformed quote on {}: {}", self.symbol, e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber of {} lagged, skipped {} quotes", self.symbol, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
