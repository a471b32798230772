//! Defines the `QuoteProvider` capability for market data ingestion.
//!
//! A provider is an opaque external source (an equities REST API, a crypto
//! aggregator, a synthetic generator). The fetcher owns rate limiting and
//! timeouts; a provider only answers one symbol per call.

use crate::error::ProviderError;
use crate::model::quote::ProviderQuote;
use async_trait::async_trait;

/// A source of quotes.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use rust_decimal::Decimal;
/// use trading::{ProviderError, ProviderQuote, QuoteProvider};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl QuoteProvider for Fixed {
///     fn source(&self) -> &str {
///         "FIX"
///     }
///
///     async fn get_quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError> {
///         Ok(ProviderQuote::new(symbol, Decimal::ONE_HUNDRED, None))
///     }
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Tag stamped on every quote from this provider.
    fn source(&self) -> &str;

    /// Fetches the current quote of `symbol`.
    async fn get_quote(&self, symbol: &str) -> Result<ProviderQuote, ProviderError>;
}
