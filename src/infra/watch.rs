//! Filesystem watcher feeding the live-update debounce stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::application::live::{ChangeFeed, spawn_debounce};

const METRIC_WATCH_EVENTS: &str = "vetrina_watch_events_total";
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Keeps the underlying watcher registration alive; dropping it stops
/// the event flow.
pub struct GalleryWatcher {
    _watcher: RecommendedWatcher,
}

/// Watch `directory` and broadcast debounced change signals on `feed`.
///
/// Must be called from within a tokio runtime: the debounce stage runs
/// as a spawned task.
pub fn start(
    directory: &Path,
    feed: Arc<ChangeFeed>,
    window: Duration,
) -> Result<GalleryWatcher, notify::Error> {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    spawn_debounce(rx, feed, window);

    let mut watcher =
        notify::recommended_watcher(move |result: Result<Event, notify::Error>| match result {
            Ok(event) if is_change(&event.kind) => {
                counter!(METRIC_WATCH_EVENTS).increment(1);
                let _ = tx.blocking_send(());
            }
            Ok(_) => {}
            Err(err) => warn!(
                target = "vetrina::watch",
                error = %err,
                "filesystem watcher reported an error"
            ),
        })?;

    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(GalleryWatcher { _watcher: watcher })
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
