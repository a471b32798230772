use crate::error::StoreError;
use crate::model::ids::AccountId;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// A score-ordered set keyed by account, like a sorted set in a key/value store.
///
/// Reads are highest score first; equal scores order by ascending account id.
#[async_trait]
pub trait RankedSet: Send + Sync {
    /// Inserts the member or replaces its score.
    async fn upsert(&self, member: AccountId, score: Decimal) -> Result<(), StoreError>;

    /// Returns `true` if the member was present.
    async fn remove(&self, member: AccountId) -> Result<bool, StoreError>;

    /// Members in descending score order, skipping `offset`, at most `limit`.
    async fn range_desc(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(AccountId, Decimal)>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Records the epoch seconds of the last completed rebuild.
    async fn mark_updated(&self, at: i64) -> Result<(), StoreError>;

    async fn last_updated(&self) -> Result<Option<i64>, StoreError>;
}
