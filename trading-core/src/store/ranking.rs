//! Sorted-set engine backing the leaderboard.

use super::poisoned;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use trading::{AccountId, RankedSet, StoreError};

#[derive(Default)]
struct RankedInner {
    scores: HashMap<AccountId, Decimal>,
    // Descending score, then ascending member id.
    order: BTreeSet<(Reverse<Decimal>, AccountId)>,
    updated_at: Option<i64>,
}

#[derive(Default)]
pub struct MemoryRankedSet {
    inner: RwLock<RankedInner>,
}

impl MemoryRankedSet {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RankedSet for MemoryRankedSet {
    async fn upsert(&self, member: AccountId, score: Decimal) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if let Some(previous) = inner.scores.insert(member, score) {
            inner.order.remove(&(Reverse(previous), member));
        }
        inner.order.insert((Reverse(score), member));
        Ok(())
    }

    async fn remove(&self, member: AccountId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        match inner.scores.remove(&member) {
            Some(score) => {
                inner.order.remove(&(Reverse(score), member));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn range_desc(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(AccountId, Decimal)>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(Reverse(score), member)| (*member, *score))
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.scores.len())
    }

    async fn mark_updated(&self, at: i64) -> Result<(), StoreError> {
        self.inner.write().map_err(poisoned)?.updated_at = Some(at);
        Ok(())
    }

    async fn last_updated(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(n: i64) -> AccountId {
        AccountId::new(n)
    }

    #[tokio::test]
    async fn test_orders_by_score_then_id() {
        let set = MemoryRankedSet::new();
        set.upsert(id(3), dec!(100)).await.unwrap();
        set.upsert(id(1), dec!(250)).await.unwrap();
        set.upsert(id(2), dec!(100)).await.unwrap();

        let all = set.range_desc(0, 10).await.unwrap();
        assert_eq!(
            all,
            vec![(id(1), dec!(250)), (id(2), dec!(100)), (id(3), dec!(100))]
        );
        assert_eq!(set.range_desc(1, 1).await.unwrap(), vec![(id(2), dec!(100))]);
        assert!(set.range_desc(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_score() {
        let set = MemoryRankedSet::new();
        set.upsert(id(1), dec!(10)).await.unwrap();
        set.upsert(id(2), dec!(20)).await.unwrap();
        set.upsert(id(1), dec!(30)).await.unwrap();

        assert_eq!(set.count().await.unwrap(), 2);
        assert_eq!(set.range_desc(0, 1).await.unwrap(), vec![(id(1), dec!(30))]);
    }

    #[tokio::test]
    async fn test_remove_and_timestamp() {
        let set = MemoryRankedSet::new();
        set.upsert(id(1), dec!(10)).await.unwrap();
        assert!(set.remove(id(1)).await.unwrap());
        assert!(!set.remove(id(1)).await.unwrap());
        assert_eq!(set.count().await.unwrap(), 0);

        assert_eq!(set.last_updated().await.unwrap(), None);
        set.mark_updated(42).await.unwrap();
        assert_eq!(set.last_updated().await.unwrap(), Some(42));
    }
}
