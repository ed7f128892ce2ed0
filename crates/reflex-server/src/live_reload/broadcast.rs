//! Broadcast engine for change notifications.
//!
//! Fans a change signal out to every connection registered at the time of
//! the snapshot. Failures are isolated per connection; if any delivery in a
//! cycle failed, the surviving connections get a best-effort error report.

use std::sync::Arc;

use serde::Serialize;

use super::registry::{ConnectionId, ConnectionRegistry};
use super::watcher::ChangeEvent;

/// Message pushed to a connected client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum ClientMessage {
    /// The watched tree changed; the client should reload.
    Changed,
    /// One or more deliveries failed during a broadcast cycle.
    Error {
        /// Failure descriptions, in delivery-attempt order.
        errors: Vec<String>,
    },
}

/// Fans change events out to the registered connections.
///
/// Borrows read access to the registry via snapshots; connection lifecycle
/// stays with the WebSocket handler.
pub(crate) struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
    verbose: bool,
}

impl BroadcastEngine {
    pub(crate) fn new(registry: Arc<ConnectionRegistry>, verbose: bool) -> Self {
        Self { registry, verbose }
    }

    /// Run one broadcast cycle for a change event.
    ///
    /// Takes a registry snapshot first, so connects and disconnects that
    /// happen mid-cycle never affect the iteration: a client that joined
    /// too late misses this cycle, a client that left gets a failed send
    /// that is recorded and tolerated.
    ///
    /// Delivery is fire-and-forget per connection. A failed send flags that
    /// connection for the remainder of the cycle; the other connections
    /// still receive their notification, followed by an error report
    /// listing what went wrong. Failures of the report itself are
    /// swallowed, the next file change is the retry.
    pub(crate) fn notify_changed(&self, event: &ChangeEvent) {
        if self.registry.is_empty() {
            if self.verbose {
                tracing::info!(
                    path = %event.path.display(),
                    "Change detected but no client is connected"
                );
            }
            return;
        }

        let targets = self.registry.snapshot();
        if self.verbose {
            tracing::info!(
                clients = targets.len(),
                path = %event.path.display(),
                coalesced = event.coalesced,
                "Broadcasting reload"
            );
        }

        let mut flagged: Vec<ConnectionId> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        for connection in &targets {
            if let Err(err) = connection.push(ClientMessage::Changed) {
                tracing::debug!(connection = %connection.id(), %err, "Reload delivery failed");
                errors.push(format!("{}: {err}", connection.id()));
                flagged.push(connection.id().clone());
            }
        }

        if errors.is_empty() {
            return;
        }

        let report = ClientMessage::Error { errors };
        for connection in &targets {
            if flagged.contains(connection.id()) {
                continue;
            }
            let _ = connection.push(report.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_reload::registry::{Connection, ConnectionId};
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn change() -> ChangeEvent {
        ChangeEvent {
            path: PathBuf::from("/site/index.html"),
            coalesced: 1,
        }
    }

    fn connect(registry: &ConnectionRegistry) -> (ConnectionId, mpsc::Receiver<ClientMessage>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(8);
        registry.add(Connection::new(id.clone(), tx));
        (id, rx)
    }

    #[test]
    fn test_client_message_serialization() {
        let changed = serde_json::to_value(&ClientMessage::Changed).unwrap();
        assert_eq!(changed["type"], "changed");

        let report = serde_json::to_value(&ClientMessage::Error {
            errors: vec!["abc: connection closed".to_owned()],
        })
        .unwrap();
        assert_eq!(report["type"], "error");
        assert_eq!(report["errors"][0], "abc: connection closed");
    }

    #[test]
    fn test_every_client_gets_exactly_one_changed() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(Arc::clone(&registry), false);
        let (_id1, mut rx1) = connect(&registry);
        let (_id2, mut rx2) = connect(&registry);
        let (_id3, mut rx3) = connect(&registry);

        engine.notify_changed(&change());

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            assert_eq!(rx.try_recv().unwrap(), ClientMessage::Changed);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_no_clients_is_a_quiet_noop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(registry, false);

        engine.notify_changed(&change());
    }

    #[test]
    fn test_one_failure_does_not_abort_the_cycle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(Arc::clone(&registry), false);
        let (_id1, mut rx1) = connect(&registry);
        let (gone_id, gone_rx) = connect(&registry);
        let (_id3, mut rx3) = connect(&registry);

        // Client went away but the broadcast still sees the old snapshot
        drop(gone_rx);

        engine.notify_changed(&change());

        for rx in [&mut rx1, &mut rx3] {
            assert_eq!(rx.try_recv().unwrap(), ClientMessage::Changed);

            let ClientMessage::Error { errors } = rx.try_recv().unwrap() else {
                panic!("expected error report");
            };
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with(&gone_id.to_string()));
        }
    }

    #[test]
    fn test_disconnect_during_cycle_is_tolerated() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(Arc::clone(&registry), false);
        let (_id1, mut rx1) = connect(&registry);
        let (gone_id, gone_rx) = connect(&registry);

        // Disconnect fully, as the lifecycle handler does on socket close
        registry.remove(&gone_id);
        drop(gone_rx);

        engine.notify_changed(&change());

        // The remaining client gets its notification and no error report:
        // the departed client was no longer in the snapshot
        assert_eq!(rx1.try_recv().unwrap(), ClientMessage::Changed);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_error_report_failures_are_swallowed() {
        let registry = Arc::new(ConnectionRegistry::new());
        let engine = BroadcastEngine::new(Arc::clone(&registry), false);

        // One client with a queue of one: the changed message fills it, so
        // the error report cannot be delivered to it
        let full_id = ConnectionId::generate();
        let (full_tx, mut full_rx) = mpsc::channel(1);
        registry.add(Connection::new(full_id, full_tx));

        let (_gone_id, gone_rx) = connect(&registry);
        drop(gone_rx);

        engine.notify_changed(&change());

        assert_eq!(full_rx.try_recv().unwrap(), ClientMessage::Changed);
        assert!(full_rx.try_recv().is_err());
    }
}
