//! Live reload subsystem.
//!
//! Watches the served tree for filesystem changes and pushes reload
//! notifications to connected browser clients over WebSocket.
//!
//! The pieces are wired together in `run_server`: the watcher emits one
//! debounced [`ChangeEvent`] per batch of raw events onto a channel, a
//! single consumer task drains that channel and hands each event to the
//! [`BroadcastEngine`], which fans it out to every connection currently in
//! the [`ConnectionRegistry`]. The WebSocket handler owns connection
//! lifecycle: register on upgrade, unregister on disconnect.

mod broadcast;
mod debouncer;
mod registry;
mod watcher;
mod websocket;

pub(crate) use broadcast::BroadcastEngine;
pub(crate) use registry::ConnectionRegistry;
pub(crate) use watcher::{ChangeEvent, ChangeWatcher, WatchOptions};
pub(crate) use websocket::ws_handler;

pub use watcher::WatchError;
