//! Periodic leaderboard recompute.

use crate::service::LeaderboardService;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Recomputes the leaderboard now and then every `period` until cancelled.
///
/// Failures are logged and the next tick tries again. Returns the number of
/// completed recomputes.
pub async fn run_worker(
    service: Arc<LeaderboardService>,
    period: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut completed = 0;

    info!("Leaderboard worker started (every {:?})", period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match service.update_leaderboard().await {
                    Ok(_) => completed += 1,
                    Err(e) => error!("Leaderboard update failed: {}", e),
                }
            }
        }
    }
    info!("Leaderboard worker stopped after {} updates", completed);
    completed
}
