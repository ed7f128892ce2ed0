//! WebSocket handler for live reload.
//!
//! Owns the lifecycle of each client connection: register on upgrade, pump
//! queued notifications out to the socket, unregister on disconnect.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use super::broadcast::ClientMessage;
use super::registry::{Connection, ConnectionId};
use crate::state::AppState;

/// Queue depth per connection.
///
/// A client that stops draining gets flagged once the queue fills instead
/// of stalling a broadcast cycle.
const CLIENT_QUEUE_CAPACITY: usize = 8;

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
///
/// The connection is registered before the first poll of the socket and
/// removed exactly once on every exit path. A broadcast running against an
/// older snapshot may still push to the channel after removal; that push
/// fails and is tolerated by the engine.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let id = ConnectionId::generate();
    let (tx, mut rx) = mpsc::channel::<ClientMessage>(CLIENT_QUEUE_CAPACITY);
    state.registry.add(Connection::new(id.clone(), tx));

    if state.verbose {
        tracing::info!(connection = %id, "Client connected");
    }

    loop {
        tokio::select! {
            // Deliver queued notifications to the client
            queued = rx.recv() => {
                match queued {
                    Some(message) => {
                        let text = serde_json::to_string(&message).unwrap();
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Drain client frames (keepalive); any error means disconnect
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.registry.remove(&id);

    if state.verbose {
        tracing::info!(connection = %id, "Client disconnected");
    }
}
