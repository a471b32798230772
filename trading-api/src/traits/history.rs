use crate::error::StoreError;
use crate::model::quote::QuoteRecord;
use async_trait::async_trait;

/// Append-only log of every stored quote.
#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn append(&self, record: &QuoteRecord) -> Result<(), StoreError>;

    /// Records of `symbol` with a quote timestamp at or after `since`, oldest first.
    async fn range(&self, symbol: &str, since: i64) -> Result<Vec<QuoteRecord>, StoreError>;
}
