//! Typed failures shared across crate boundaries.

use crate::model::ids::AccountId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Failure of a cache, ledger, ranking or history store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A position row was requested before its account row was locked.
    #[error("lock order violated: {0}")]
    LockOrder(String),

    /// A write would break a stored invariant (negative balance, duplicate key...).
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of an external quote provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    /// Zero price, unparsable body, market closed or rate limited.
    #[error("invalid quote for {symbol}: {reason}")]
    InvalidQuote { symbol: String, reason: String },

    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a quote read through the market data facade.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The symbol is not on the tracked allow-list.
    #[error("symbol {0} is not tracked")]
    SymbolNotAllowed(String),

    /// The symbol is tracked but no quote has been cached yet.
    #[error("market data for {0} is warming up")]
    NotWarmed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of a buy or sell. No state has changed when one of these is returned.
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("symbol {0} is not tracked")]
    SymbolNotAllowed(String),

    #[error("no quote available for {0}")]
    SymbolUnavailable(String),

    /// The latest quote is older than the staleness window.
    #[error("market closed for {symbol}: last quote is {age_secs}s old")]
    MarketClosed { symbol: String, age_secs: i64 },

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("insufficient quantity of {symbol}: requested {requested}, held {held}")]
    InsufficientQuantity {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    /// The trade value or the resulting balance does not fit in a `Decimal`.
    #[error("trade value for {0} is out of range")]
    AmountOverflow(String),

    /// Infrastructure failure. The transaction was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] StoreError),
}

impl From<MarketDataError> for TradeError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::SymbolNotAllowed(symbol) => TradeError::SymbolNotAllowed(symbol),
            MarketDataError::NotWarmed(symbol) => TradeError::SymbolUnavailable(symbol),
            MarketDataError::Store(e) => TradeError::TransactionFailed(e),
        }
    }
}
