//! Market quote models.
//!
//! Includes `ProviderQuote` as returned by an external provider, the cached `Quote`,
//! the read-time `QuoteView` carrying the staleness flag, and the immutable
//! `QuoteRecord` appended to the history log.

use super::money::to_currency_precision;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw answer of a quote provider, before sanitising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuote {
    pub symbol: String,
    pub price: Decimal,
    /// Epoch seconds reported by the provider, if any.
    pub timestamp: Option<i64>,
}

impl ProviderQuote {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: Option<i64>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}

/// The latest known price of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    symbol: String,
    price: Decimal,
    /// Epoch seconds.
    timestamp: i64,
    /// Provider tag, e.g. "FH" or "CG".
    source: String,
}

impl Quote {
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        timestamp: i64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            source: source.into(),
        }
    }

    /// Builds a cacheable quote from a provider answer.
    ///
    /// The price is rounded to currency precision and a missing timestamp falls back to
    /// `fetched_at`.
    pub fn from_provider(raw: ProviderQuote, source: &str, fetched_at: i64) -> Self {
        let timestamp = raw.timestamp.filter(|ts| *ts > 0).unwrap_or(fetched_at);
        Self::new(raw.symbol, to_currency_precision(raw.price), timestamp, source)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Seconds elapsed between the quote and `now`. Never negative.
    pub fn age_secs(&self, now: i64) -> i64 {
        (now - self.timestamp).max(0)
    }

    pub fn is_stale(&self, now: i64, window: Duration) -> bool {
        self.age_secs(now) as u64 > window.as_secs()
    }

    /// Two ticks carrying the same price and timestamp are the same observation.
    pub fn same_tick(&self, other: &Quote) -> bool {
        self.price == other.price && self.timestamp == other.timestamp
    }

    /// Attaches the staleness flag computed at read time.
    pub fn view(self, now: i64, window: Duration) -> QuoteView {
        let is_stale = self.is_stale(now, window);
        QuoteView {
            quote: self,
            is_stale,
        }
    }
}

/// A cached quote as seen by a reader. `is_stale` is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteView {
    #[serde(flatten)]
    pub quote: Quote,
    pub is_stale: bool,
}

/// Immutable history point appended after every cache write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    #[serde(flatten)]
    pub quote: Quote,
    /// Epoch seconds at which the fetcher stored the quote.
    pub recorded_at: i64,
}

impl QuoteRecord {
    pub fn new(quote: Quote, recorded_at: i64) -> Self {
        Self { quote, recorded_at }
    }
}
