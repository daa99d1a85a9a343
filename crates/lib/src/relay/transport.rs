//! WebSocket transport for the relay hub.
//!
//! Each upgraded socket gets a slot lease and a task that turns frames into
//! [`RelayEvent`]s for the hub and writes the hub's deliveries back to the socket.
//! The task never touches the registry itself.

use crate::relay::hub::RelayEvent;
use crate::relay::slots::{SlotAllocator, SlotLease};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared state for the WebSocket listener.
#[derive(Clone)]
pub struct RelayTransport {
    events: mpsc::Sender<RelayEvent>,
    slots: Arc<SlotAllocator>,
    shutdown: CancellationToken,
}

impl RelayTransport {
    pub fn new(
        events: mpsc::Sender<RelayEvent>,
        slots: Arc<SlotAllocator>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            events,
            slots,
            shutdown,
        }
    }

    /// Router that upgrades on any path. Serve it with
    /// `into_make_service_with_connect_info::<SocketAddr>()` so peers are known.
    pub fn router(self) -> Router {
        Router::new().fallback(ws_handler).with_state(self)
    }
}

/// Upgrade when a slot is free; 503 otherwise.
async fn ws_handler(
    State(transport): State<RelayTransport>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(lease) = transport.slots.acquire() else {
        log::warn!("[WS] refusing {}: all relay slots in use", peer);
        return (StatusCode::SERVICE_UNAVAILABLE, "relay full").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, lease, peer, transport))
}

async fn handle_socket(
    mut socket: WebSocket,
    lease: SlotLease,
    peer: SocketAddr,
    transport: RelayTransport,
) {
    let slot = lease.slot();
    let (outbox, mut outbound) = mpsc::unbounded_channel::<String>();
    if transport
        .events
        .send(RelayEvent::Connect { slot, peer, outbox })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            biased;

            _ = transport.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            text = outbound.recv() => {
                // Outbox dropped: the hub let go of this client.
                let Some(text) = text else { break };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let event = match msg {
                    Message::Text(text) => RelayEvent::Text { slot, text },
                    Message::Binary(data) => RelayEvent::Binary { slot, data },
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                if transport.events.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    // The disconnect must reach the hub before the slot can be issued again.
    let _ = transport.events.send(RelayEvent::Disconnect { slot }).await;
    drop(lease);
}
