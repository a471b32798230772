//! # Market Fetcher
//!
//! Keeps the quote cache warm. Symbols are split into one group per provider;
//! each group polls its symbols one at a time with a fixed pause between
//! requests, and groups run in parallel. Changed quotes are written to the cache
//! (which publishes them) and queued for the history log.

pub mod group;
pub mod history;
pub mod partition;
pub mod random_walk;

pub use group::{FetchStats, FetcherGroup, GroupSettings, TickOutcome};
pub use history::{HistoryHandle, HistoryStats, HistoryWriter};
pub use partition::partition_symbols;
pub use random_walk::RandomWalkProvider;
