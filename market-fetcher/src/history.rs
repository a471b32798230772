//! Background history writer.
//!
//! Fetcher groups hand records to a bounded queue and move on. A single task
//! drains the queue into the [`HistoryLog`], giving every append its own timeout
//! so a slow log never reaches back into the live quote path. When the queue is
//! full the record is dropped and counted. Once every [`HistoryHandle`] is gone
//! the task finishes the backlog and reports its [`HistoryStats`].

use log::{debug, error, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use trading::{HistoryLog, QuoteRecord};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    pub written: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Records refused because the queue was full.
    pub dropped: u64,
}

/// Producer side of the history queue. Cheap to clone.
#[derive(Clone)]
pub struct HistoryHandle {
    sender: mpsc::Sender<QuoteRecord>,
    dropped: Arc<AtomicU64>,
}

impl HistoryHandle {
    /// Queues `record` without waiting. Returns false if it was not accepted.
    pub fn record(&self, record: QuoteRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "[{}] History queue full, dropping record",
                    record.quote.symbol()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                error!("[{}] History writer is gone", record.quote.symbol());
                false
            }
        }
    }
}

pub struct HistoryWriter {
    task: JoinHandle<HistoryStats>,
    dropped: Arc<AtomicU64>,
}

impl HistoryWriter {
    /// Starts the writer task. Must be called inside a tokio runtime.
    pub fn spawn(
        log: Arc<dyn HistoryLog>,
        capacity: usize,
        append_timeout: Duration,
    ) -> (Self, HistoryHandle) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(drain(log, receiver, append_timeout));
        (
            Self {
                task,
                dropped: dropped.clone(),
            },
            HistoryHandle { sender, dropped },
        )
    }

    /// Waits for the backlog to be written. Only returns after every handle is dropped.
    pub async fn finish(self) -> HistoryStats {
        let mut stats = match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("History writer task failed: {}", e);
                HistoryStats::default()
            }
        };
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }
}

async fn drain(
    log: Arc<dyn HistoryLog>,
    mut receiver: mpsc::Receiver<QuoteRecord>,
    append_timeout: Duration,
) -> HistoryStats {
    let mut stats = HistoryStats::default();
    while let Some(record) = receiver.recv().await {
        match timeout(append_timeout, log.append(&record)).await {
            Ok(Ok(())) => stats.written += 1,
            Ok(Err(e)) => {
                stats.failed += 1;
                warn!("[{}] History append failed: {}", record.quote.symbol(), e);
            }
            Err(_) => {
                stats.timed_out += 1;
                warn!(
                    "[{}] History append timed out after {:?}",
                    record.quote.symbol(),
                    append_timeout
                );
            }
        }
    }
    debug!("History writer drained: {:?}", stats);
    stats
}
