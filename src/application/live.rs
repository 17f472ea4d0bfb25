//! Live-update fan-out: a broadcast feed of "changed" signals plus the
//! debounce stage that collapses filesystem event bursts into one signal.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

const METRIC_SIGNALS: &str = "vetrina_live_signals_total";

/// Capacity of the broadcast ring; a subscriber that falls further
/// behind drops its own backlog without affecting the others.
const FEED_CAPACITY: usize = 32;

/// The signal deliberately carries no filename, path, or change type:
/// the contract to clients is only "re-fetch, something changed".
#[derive(Debug, Clone, Copy)]
pub struct ChangeSignal;

/// Fan-out channel for connected live-update subscribers.
///
/// Fire-and-forget: no acknowledgment, ordering, or delivery guarantee.
/// Sending to a feed with no subscribers is a no-op, and one failed or
/// lagging subscriber never prevents delivery to the rest.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeSignal>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Fan one "changed" signal out to every current subscriber.
    pub fn notify(&self) {
        counter!(METRIC_SIGNALS).increment(1);
        let subscribers = self.sender.receiver_count();
        debug!(
            target = "vetrina::live",
            subscribers, "broadcasting change signal"
        );
        let _ = self.sender.send(ChangeSignal);
    }

    /// Register a new subscriber; membership ends when the receiver drops.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSignal> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridge raw watcher events into the feed.
///
/// Events arriving within `window` of each other coalesce into a single
/// trailing signal. A zero window forwards one signal per raw event.
pub fn spawn_debounce(
    mut raw: mpsc::Receiver<()>,
    feed: Arc<ChangeFeed>,
    window: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if window.is_zero() {
            while raw.recv().await.is_some() {
                feed.notify();
            }
            return;
        }

        while raw.recv().await.is_some() {
            // Absorb the rest of the burst before signalling once.
            while let Ok(Some(())) = tokio::time::timeout(window, raw.recv()).await {}
            feed.notify();
        }
    })
}
