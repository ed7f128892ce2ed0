//! Change batching for the file watcher.
//!
//! Editors emit several raw filesystem events for one logical save (write,
//! rename, metadata touch). The debouncer folds everything recorded within
//! a window into a single pending batch, drained once the window has
//! elapsed without further activity.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::watcher::ChangeEvent;

/// Batch waiting to be emitted.
struct PendingBatch {
    deadline: Instant,
    last_path: PathBuf,
    coalesced: usize,
}

/// Thread-safe batch debouncer.
///
/// Unlike a per-path debouncer, the whole tree shares one batch: clients
/// reload the full page anyway, so one signal per burst is enough.
pub(crate) struct BatchDebouncer {
    pending: Mutex<Option<PendingBatch>>,
    window: Duration,
}

impl BatchDebouncer {
    /// Create a new debouncer with the specified window.
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            window,
        }
    }

    /// Record one raw event.
    ///
    /// Thread-safe, can be called from the watcher callback path. Each
    /// recording extends the batch deadline, so a burst of events yields a
    /// single signal after the burst settles.
    pub(crate) fn record(&self, path: PathBuf) {
        let mut pending = self.pending.lock().unwrap();
        let deadline = Instant::now() + self.window;

        match pending.as_mut() {
            Some(batch) => {
                batch.deadline = deadline;
                batch.last_path = path;
                batch.coalesced += 1;
            }
            None => {
                *pending = Some(PendingBatch {
                    deadline,
                    last_path: path,
                    coalesced: 1,
                });
            }
        }
    }

    /// Take the pending batch if its window has elapsed.
    ///
    /// Thread-safe, called from the async drain task.
    pub(crate) fn drain_ready(&self) -> Option<ChangeEvent> {
        let mut pending = self.pending.lock().unwrap();
        if pending
            .as_ref()
            .is_some_and(|batch| batch.deadline <= Instant::now())
        {
            return pending.take().map(|batch| ChangeEvent {
                path: batch.last_path,
                coalesced: batch.coalesced,
            });
        }
        None
    }
}
