//! # Leaderboard
//!
//! Ranks accounts by net worth: cash plus every holding marked at its latest
//! cached price. Scores live in a ranked set rebuilt by a periodic worker, so
//! reads never recompute.

pub mod error;
pub mod service;
pub mod worker;

pub use error::LeaderboardError;
pub use service::{LeaderboardService, UpdateReport};
pub use worker::run_worker;
