//! In-process store engines.
//!
//! Each engine implements one `trading` store trait with the semantics of the
//! external store it stands in for: a key/value cache with pub/sub channels, a
//! relational ledger with row-level locks, a sorted set, and an append-only log.

pub mod cache;
pub mod history;
pub mod ledger;
pub mod ranking;

pub use cache::MemoryQuoteCache;
pub use history::{CsvHistoryLog, MemoryHistoryLog};
pub use ledger::{MemoryLedger, MemorySession};
pub use ranking::MemoryRankedSet;

use std::sync::PoisonError;
use trading::StoreError;

pub(crate) fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("lock poisoned".into())
}
