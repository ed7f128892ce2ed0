//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::live_reload::{ChangeWatcher, ConnectionRegistry};

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Registry of connected live reload clients.
    pub(crate) registry: Arc<ConnectionRegistry>,
    /// Root directory being served and watched.
    pub(crate) root: PathBuf,
    /// Skip injecting the bootstrap script into HTML responses.
    pub(crate) skip_injection: bool,
    /// Enable verbose output (log connection and broadcast activity).
    pub(crate) verbose: bool,
    /// Change watcher; kept here so the underlying watch stays alive for
    /// the lifetime of the server. `None` when live reload is disabled.
    pub(crate) live_reload: Option<ChangeWatcher>,
}

impl AppState {
    /// Check if live reload is enabled.
    #[must_use]
    pub(crate) fn live_reload_enabled(&self) -> bool {
        self.live_reload.is_some()
    }

    /// Check if HTML responses should get the bootstrap script injected.
    #[must_use]
    pub(crate) fn inject_enabled(&self) -> bool {
        self.live_reload_enabled() && !self.skip_injection
    }
}
