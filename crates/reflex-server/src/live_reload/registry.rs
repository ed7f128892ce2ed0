//! Connection registry for live reload clients.
//!
//! Tracks every open WebSocket connection so a broadcast can reach all
//! clients connected at a point in time. The registry is the only shared
//! mutable resource in the subsystem; the lock is held for map operations
//! only, never across sends.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::broadcast::ClientMessage;

/// Unique identifier for one client connection.
///
/// Generated by the transport layer on accept; assumed unique for the
/// lifetime of the process.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random id.
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a queued delivery did not reach a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PushError {
    /// The client disconnected; the receiving half is gone.
    Closed,
    /// The client is not draining its queue.
    QueueFull,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("connection closed"),
            Self::QueueFull => f.write_str("send queue full"),
        }
    }
}

/// Handle to one live client connection.
///
/// The receiving half of the channel is owned by the socket pump task;
/// the registry and broadcast engine only clone this handle and never own
/// the connection's lifecycle.
#[derive(Clone, Debug)]
pub(crate) struct Connection {
    id: ConnectionId,
    sender: mpsc::Sender<ClientMessage>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, sender: mpsc::Sender<ClientMessage>) -> Self {
        Self { id, sender }
    }

    pub(crate) fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a message for delivery without waiting.
    ///
    /// Fire-and-forget: the actual network write happens on the socket pump
    /// task. Fails when the client has disconnected or stopped draining its
    /// queue; the caller decides what to do with the failure.
    pub(crate) fn push(&self, message: ClientMessage) -> Result<(), PushError> {
        self.sender.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            mpsc::error::TrySendError::Full(_) => PushError::QueueFull,
        })
    }
}

/// Thread-safe set of active client connections, keyed by connection id.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// A duplicate id is a no-op; ids are generated by the transport layer
    /// and assumed unique, so the first registration wins.
    pub(crate) fn add(&self, connection: Connection) {
        let mut connections = self.connections.lock().unwrap();
        connections
            .entry(connection.id().clone())
            .or_insert(connection);
    }

    /// Unregister a connection.
    ///
    /// Idempotent: removing an absent id is a no-op, so a disconnect
    /// observed twice (or raced with a broadcast) stays harmless.
    pub(crate) fn remove(&self, id: &ConnectionId) {
        let mut connections = self.connections.lock().unwrap();
        connections.remove(id);
    }

    /// Copy of the current connection set.
    ///
    /// Copy-on-read, not a live view: safe to iterate while the registry
    /// keeps mutating. A connection registered after this call misses the
    /// cycle and catches the next one.
    pub(crate) fn snapshot(&self) -> Vec<Connection> {
        let connections = self.connections.lock().unwrap();
        connections.values().cloned().collect()
    }

    /// True when no client is connected. Diagnostics only.
    pub(crate) fn is_empty(&self) -> bool {
        self.connections.lock().unwrap().is_empty()
    }
}
