//! File watching for re-rendering.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created
    Created(PathBuf),

    /// File was deleted
    Deleted(PathBuf),

    /// File contents or metadata changed
    Modified(PathBuf),
}

impl WatchEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Deleted(path) | WatchEvent::Modified(path) => {
                path
            }
        }
    }
}

/// Quiet period used to coalesce bursts of events (editors often write a
/// file several times per save).
const DEBOUNCE: Duration = Duration::from_millis(100);

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive events. Events stop
    /// once the watcher is dropped.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut batch = vec![first];

                // Collect everything arriving within the debounce window
                let deadline = Instant::now() + DEBOUNCE;
                while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                    match sync_rx.recv_timeout(remaining) {
                        Ok(event) => batch.push(event),
                        Err(_) => break,
                    }
                }

                let mut pending: Vec<WatchEvent> = Vec::new();
                for event in batch {
                    for path in &event.paths {
                        if let Some(e) = classify_event(path, &event.kind) {
                            coalesce(&mut pending, e);
                        }
                    }
                }

                for e in pending {
                    if async_tx.blocking_send(e).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Add `event` to `pending`, keeping one event per path.
///
/// A file created and then written within one burst stays `Created`.
fn coalesce(pending: &mut Vec<WatchEvent>, event: WatchEvent) {
    match pending.iter().position(|p| p.path() == event.path()) {
        Some(i) => {
            if !matches!(
                (&pending[i], &event),
                (WatchEvent::Created(_), WatchEvent::Modified(_))
            ) {
                pending[i] = event;
            }
        }
        None => pending.push(event),
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        EventKind::Modify(_) => Some(WatchEvent::Modified(path.to_path_buf())),
        _ => None,
    }
}
