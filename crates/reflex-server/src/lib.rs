//! HTTP server for the reflex live-reload relay.
//!
//! This crate provides a native Rust HTTP server using axum, serving:
//! - Static files (with HTML bootstrap injection) from the watched root
//! - A WebSocket endpoint that pushes reload notifications to browsers
//! - The embedded client bootstrap script
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use reflex_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         host: "127.0.0.1".to_string(),
//!         port: 4242,
//!         root: PathBuf::from("public"),
//!         live_reload_enabled: true,
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► Rust axum server (reflex-server)
//!                        │
//!                        ├─► Static files + HTML injection
//!                        │
//!                        ├─► WebSocket (connection lifecycle)
//!                        │       │
//!                        │       └─► ConnectionRegistry ◄── BroadcastEngine
//!                        │                                       ▲
//!                        └─► /__reflex/client.js                 │
//!                                                          ChangeWatcher
//!                                                       (notify + debounce)
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod state;
mod static_files;

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use live_reload::{BroadcastEngine, ChangeEvent, ChangeWatcher, ConnectionRegistry, WatchOptions};
use state::AppState;

pub use live_reload::WatchError;

/// Capacity of the change event channel between watcher and broadcaster.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory to serve and watch.
    pub root: PathBuf,
    /// Directory names whose contents never trigger a reload.
    pub excluded_dirs: BTreeSet<String>,
    /// Debounce window in milliseconds for coalescing filesystem events.
    pub debounce_ms: u64,
    /// Enable live reload.
    pub live_reload_enabled: bool,
    /// Skip injecting the bootstrap script into HTML responses.
    pub skip_injection: bool,
    /// Enable verbose output.
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4242,
            root: PathBuf::from("."),
            excluded_dirs: reflex_config::DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            debounce_ms: 250,
            live_reload_enabled: false,
            skip_injection: false,
            verbose: false,
        }
    }
}

/// Run the server.
///
/// # Arguments
///
/// * `config` - Server configuration
///
/// # Errors
///
/// Returns an error if the watch root is invalid or the server fails to
/// start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(ConnectionRegistry::new());

    // Start the watcher and the broadcast consumer if live reload is on
    let live_reload = if config.live_reload_enabled {
        let (tx, mut rx) = mpsc::channel::<ChangeEvent>(CHANGE_CHANNEL_CAPACITY);
        let mut watcher = ChangeWatcher::new(
            WatchOptions {
                root: config.root.clone(),
                excluded_dirs: config.excluded_dirs.clone(),
                debounce: Duration::from_millis(config.debounce_ms),
                verbose: config.verbose,
            },
            tx,
        );
        watcher.start()?;

        // Single consumer: decouples filesystem latency from broadcasts
        let engine = BroadcastEngine::new(Arc::clone(&registry), config.verbose);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.notify_changed(&event);
            }
        });

        Some(watcher)
    } else {
        None
    };

    // Create app state
    let state = Arc::new(AppState {
        registry,
        root: config.root.clone(),
        skip_injection: config.skip_injection,
        verbose: config.verbose,
        live_reload,
    });

    // Create router
    let app = app::create_router(state);

    // Bind and run server
    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from reflex config.
///
/// # Arguments
///
/// * `config` - reflex configuration
/// * `verbose` - Enable verbose output
#[must_use]
pub fn server_config_from_config(config: &reflex_config::Config, verbose: bool) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.watch_resolved.root.clone(),
        excluded_dirs: config.watch_resolved.excluded_dirs.clone(),
        debounce_ms: config.watch_resolved.debounce_ms,
        live_reload_enabled: config.reload.enabled,
        skip_injection: config.reload.skip_injection,
        verbose,
    }
}
