//! Leaderboard read models. Derived data, rebuilt on every recompute.

use super::ids::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub account_id: AccountId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Cash plus mark-to-market value of every holding.
    pub total_net_worth: Decimal,
    /// 1-based, highest net worth first. Entries evicted while reading a page
    /// leave no gap: ranks stay contiguous within the page.
    pub rank: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub total_count: usize,
    /// Epoch seconds of the last completed recompute.
    pub last_update: Option<i64>,
}
