//! Filesystem watcher for live reload.
//!
//! Wraps a recursive `notify` watch over the served root, filters out
//! control directories, and emits one debounced [`ChangeEvent`] per batch
//! of raw filesystem events.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::debouncer::BatchDebouncer;

/// Interval at which settled batches are drained from the debouncer.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A debounced change signal.
///
/// The path and count are diagnostics for logging only; clients are told
/// nothing beyond "changed".
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChangeEvent {
    /// Path from the last raw event folded into the batch.
    pub(crate) path: PathBuf,
    /// Number of raw events folded into this signal.
    pub(crate) coalesced: usize,
}

/// Watch settings, immutable once the watcher is started.
#[derive(Clone, Debug)]
pub(crate) struct WatchOptions {
    /// Root directory to watch recursively.
    pub(crate) root: PathBuf,
    /// Directory names whose contents never trigger a change signal.
    pub(crate) excluded_dirs: BTreeSet<String>,
    /// Debounce window for coalescing raw events.
    pub(crate) debounce: Duration,
    /// Log change activity at info level.
    pub(crate) verbose: bool,
}

/// Fatal watcher startup error.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The configured root does not exist.
    #[error("watch root does not exist: {}", .0.display())]
    RootMissing(PathBuf),
    /// The configured root is not a directory.
    #[error("watch root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
    /// The underlying watch could not be established.
    #[error("failed to start filesystem watch: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches the served tree and emits debounced change events.
pub(crate) struct ChangeWatcher {
    options: WatchOptions,
    events: mpsc::Sender<ChangeEvent>,
    watcher: Option<RecommendedWatcher>,
}

impl ChangeWatcher {
    /// Create a new watcher that emits change events onto `events`.
    #[must_use]
    pub(crate) fn new(options: WatchOptions, events: mpsc::Sender<ChangeEvent>) -> Self {
        Self {
            options,
            events,
            watcher: None,
        }
    }

    /// Start watching.
    ///
    /// Validates the root, then spawns two background tasks: one records
    /// raw notify events into the debouncer, one drains settled batches
    /// onto the change channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is missing or not a directory, or if
    /// the underlying watch cannot be created. These are startup faults;
    /// nothing is retried.
    pub(crate) fn start(&mut self) -> Result<(), WatchError> {
        let root = &self.options.root;
        if !root.exists() {
            return Err(WatchError::RootMissing(root.clone()));
        }
        if !root.is_dir() {
            return Err(WatchError::RootNotDirectory(root.clone()));
        }

        let (tx, mut rx) = mpsc::channel::<Event>(100);

        // Create watcher with callback that sends events to channel.
        // Transient watch errors are logged and watching continues.
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                // Use blocking_send since callback is sync
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(err) => tracing::warn!(error = %err, "Filesystem watch error"),
            })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        let debouncer = Arc::new(BatchDebouncer::new(self.options.debounce));

        // Spawn task to record raw events into the debouncer
        let debouncer_for_record = Arc::clone(&debouncer);
        let excluded_dirs = self.options.excluded_dirs.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                record_event(&event, &excluded_dirs, &debouncer_for_record);
            }
        });

        // Spawn task to emit settled batches
        let events = self.events.clone();
        let verbose = self.options.verbose;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DRAIN_POLL_INTERVAL);

            loop {
                interval.tick().await;

                if let Some(change) = debouncer.drain_ready() {
                    if verbose {
                        tracing::info!(
                            path = %change.path.display(),
                            coalesced = change.coalesced,
                            "Change detected"
                        );
                    }
                    if events.send(change).await.is_err() {
                        // Consumer is gone, nothing left to notify
                        break;
                    }
                }
            }
        });

        Ok(())
    }
}

/// Record a raw filesystem event into the debouncer.
fn record_event(event: &Event, excluded_dirs: &BTreeSet<String>, debouncer: &BatchDebouncer) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        _ => return,
    }

    for path in &event.paths {
        if is_excluded(path, excluded_dirs) {
            continue;
        }
        debouncer.record(path.clone());
        tracing::debug!(path = %path.display(), "Recorded filesystem event");
    }
}

/// True when any component of `path` matches an excluded directory name.
fn is_excluded(path: &Path, excluded_dirs: &BTreeSet<String>) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|name| excluded_dirs.contains(name)),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, ModifyKind};

    fn options(root: PathBuf) -> WatchOptions {
        WatchOptions {
            root,
            excluded_dirs: [".git", "node_modules", ".hg"]
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            debounce: Duration::from_millis(250),
            verbose: false,
        }
    }

    #[test]
    fn test_start_fails_for_missing_root() {
        let (tx, _rx) = mpsc::channel(16);
        let mut watcher = ChangeWatcher::new(options(PathBuf::from("/nonexistent/site")), tx);

        let err = watcher.start().unwrap_err();
        assert!(matches!(err, WatchError::RootMissing(_)));
    }

    #[test]
    fn test_start_fails_for_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html></html>").unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let mut watcher = ChangeWatcher::new(options(file), tx);

        let err = watcher.start().unwrap_err();
        assert!(matches!(err, WatchError::RootNotDirectory(_)));
    }

    #[test]
    fn test_is_excluded_matches_any_component() {
        let excluded = options(PathBuf::from("/site")).excluded_dirs;

        assert!(is_excluded(Path::new("/site/.git/HEAD"), &excluded));
        assert!(is_excluded(
            Path::new("/site/app/node_modules/pkg/index.js"),
            &excluded
        ));
        assert!(is_excluded(Path::new("/site/.hg/store/data"), &excluded));
    }

    #[test]
    fn test_is_excluded_requires_exact_component_match() {
        let excluded = options(PathBuf::from("/site")).excluded_dirs;

        assert!(!is_excluded(Path::new("/site/index.html"), &excluded));
        assert!(!is_excluded(Path::new("/site/gitlog/notes.txt"), &excluded));
        assert!(!is_excluded(
            Path::new("/site/node_modules_backup/a.js"),
            &excluded
        ));
    }

    #[test]
    fn test_excluded_events_are_not_recorded() {
        let excluded = options(PathBuf::from("/site")).excluded_dirs;
        let debouncer = BatchDebouncer::new(Duration::from_millis(0));

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/.git/index"));
        record_event(&event, &excluded, &debouncer);

        std::thread::sleep(Duration::from_millis(5));
        assert!(debouncer.drain_ready().is_none());
    }

    #[test]
    fn test_qualifying_events_are_recorded() {
        let excluded = options(PathBuf::from("/site")).excluded_dirs;
        let debouncer = BatchDebouncer::new(Duration::from_millis(0));

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/index.html"));
        record_event(&event, &excluded, &debouncer);

        std::thread::sleep(Duration::from_millis(5));
        let change = debouncer.drain_ready().unwrap();
        assert_eq!(change.path, PathBuf::from("/site/index.html"));
        assert_eq!(change.coalesced, 1);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let excluded = options(PathBuf::from("/site")).excluded_dirs;
        let debouncer = BatchDebouncer::new(Duration::from_millis(0));

        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/site/index.html"));
        record_event(&event, &excluded, &debouncer);

        std::thread::sleep(Duration::from_millis(5));
        assert!(debouncer.drain_ready().is_none());
    }
}
