//! Quote stream delivery loop.
//!
//! One loop runs per connected client. It selects, without priority, over the
//! next published quote, the heartbeat tick, cancellation and client disconnect.
//! Heartbeats keep idle connections alive through intermediary proxies.

use log::{debug, info};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use trading::{Quote, QuoteSubscription};

/// A message pushed to a stream consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Quote(Quote),
    Heartbeat,
}

/// Why a delivery loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEnd {
    Cancelled,
    /// The receiving half of the sink was dropped.
    ClientGone,
    /// The quote channel was closed by the cache.
    ChannelClosed,
}

pub async fn deliver_quotes(
    mut subscription: QuoteSubscription,
    sink: mpsc::Sender<StreamEvent>,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> DeliveryEnd {
    let heartbeat = heartbeat.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = 'delivery: loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break 'delivery DeliveryEnd::Cancelled,
            _ = sink.closed() => break 'delivery DeliveryEnd::ClientGone,
            next = subscription.recv() => match next {
                Some(quote) => StreamEvent::Quote(quote),
                None => break 'delivery DeliveryEnd::ChannelClosed,
            },
            _ = ticker.tick() => StreamEvent::Heartbeat,
        };

        if sink.send(event).await.is_err() {
            break 'delivery DeliveryEnd::ClientGone;
        }
    };

    match end {
        DeliveryEnd::Cancelled => info!("Stream of {} cancelled", subscription.symbol()),
        other => debug!("Stream of {} ended: {:?}", subscription.symbol(), other),
    }
    end
}
