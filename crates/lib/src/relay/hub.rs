//! Session relay hub: the registry of connected clients and the relay/broadcast logic.
//!
//! The hub is a plain state machine. It owns its registry outright and is driven through
//! [`RelayHub::handle`] from a single loop, so no locking is involved. Deliveries go out
//! through each client's [`Outbox`]; a failed delivery is logged and skipped.

use crate::relay::envelope::{announced_identity, ServerEnvelope};
use crate::relay::slots::ConnectionSlot;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Sending half of a client's outbound text queue. The transport owns the receiver.
pub type Outbox = mpsc::UnboundedSender<String>;

/// Transport activity for one slot.
#[derive(Debug)]
pub enum RelayEvent {
    Connect {
        slot: ConnectionSlot,
        peer: SocketAddr,
        outbox: Outbox,
    },
    Text {
        slot: ConnectionSlot,
        text: String,
    },
    Binary {
        slot: ConnectionSlot,
        data: Vec<u8>,
    },
    Disconnect {
        slot: ConnectionSlot,
    },
}

/// One open connection. Exists exactly while the slot's WebSocket is open.
#[derive(Debug)]
pub struct ClientRecord {
    /// Set once, by the first message carrying a non-empty `uuid`.
    identity: Option<String>,
    last_seen: Instant,
    peer: SocketAddr,
    outbox: Outbox,
}

impl ClientRecord {
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

/// Owner of the slot → client registry.
#[derive(Debug)]
pub struct RelayHub {
    clients: HashMap<ConnectionSlot, ClientRecord>,
    /// Zero point for the `timestamp` on server-authored envelopes.
    epoch: Instant,
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl RelayHub {
    /// Envelope timestamps are milliseconds since `epoch` (normally gateway start).
    pub fn new(epoch: Instant) -> Self {
        Self {
            clients: HashMap::new(),
            epoch,
        }
    }

    fn timestamp(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Apply one event. Events for a slot must arrive in transport order.
    pub fn handle(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connect { slot, peer, outbox } => self.on_connect(slot, peer, outbox),
            RelayEvent::Text { slot, text } => self.on_text(slot, text),
            RelayEvent::Binary { slot, data } => self.on_binary(slot, data),
            RelayEvent::Disconnect { slot } => self.on_disconnect(slot),
        }
    }

    fn on_connect(&mut self, slot: ConnectionSlot, peer: SocketAddr, outbox: Outbox) {
        log::info!("[WS] client {} connected from {}", slot, peer);
        let record = ClientRecord {
            identity: None,
            last_seen: Instant::now(),
            peer,
            outbox,
        };
        if self.clients.insert(slot, record).is_some() {
            log::warn!("[WS] client {} reconnected without a disconnect; previous record replaced", slot);
        }
        let welcome = ServerEnvelope::connected(slot, self.timestamp()).to_json();
        if let Some(record) = self.clients.get(&slot) {
            deliver(slot, record, welcome);
        }
        log::debug!("  active clients: {}", self.clients.len());
    }

    fn on_text(&mut self, slot: ConnectionSlot, text: String) {
        log::debug!("[WS] client {} sent: {}", slot, text);
        if let Some(record) = self.clients.get_mut(&slot) {
            record.last_seen = Instant::now();
            if record.identity.is_none() {
                if let Some(identity) = announced_identity(&text) {
                    log::info!("  registered uuid {} for client {}", identity, slot);
                    record.identity = Some(identity);
                }
            }
        }
        let relayed = self.relay_from(slot, &text);
        log::debug!("  relayed to {} clients", relayed);
    }

    fn on_binary(&mut self, slot: ConnectionSlot, data: Vec<u8>) {
        if let Some(record) = self.clients.get_mut(&slot) {
            record.last_seen = Instant::now();
        }
        log::debug!("[WS] client {} sent binary data ({} bytes) - ignored", slot, data.len());
    }

    fn on_disconnect(&mut self, slot: ConnectionSlot) {
        log::info!("[WS] client {} disconnected", slot);
        let Some(record) = self.clients.remove(&slot) else {
            return;
        };
        let uuid = record.identity.unwrap_or_default();
        log::debug!("  removed client with uuid: {}", uuid);
        log::debug!("  active clients: {}", self.clients.len());

        let notice = ServerEnvelope::player_disconnected(uuid, self.timestamp()).to_json();
        self.broadcast(&notice);
    }

    /// Deliver `text` to every connected slot except `from`. Returns successful deliveries.
    fn relay_from(&self, from: ConnectionSlot, text: &str) -> usize {
        let mut delivered = 0;
        for (slot, record) in &self.clients {
            if *slot != from && deliver(*slot, record, text.to_string()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver `text` to every connected slot. Returns successful deliveries.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut delivered = 0;
        for (slot, record) in &self.clients {
            if deliver(*slot, record, text.to_string()) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn contains(&self, slot: ConnectionSlot) -> bool {
        self.clients.contains_key(&slot)
    }

    pub fn client(&self, slot: ConnectionSlot) -> Option<&ClientRecord> {
        self.clients.get(&slot)
    }

    pub fn identity(&self, slot: ConnectionSlot) -> Option<&str> {
        self.clients.get(&slot).and_then(|r| r.identity())
    }

    pub fn last_seen(&self, slot: ConnectionSlot) -> Option<Instant> {
        self.clients.get(&slot).map(|r| r.last_seen)
    }

    /// Drop every record without notifying anyone. Closing the outboxes ends the
    /// transport's socket tasks.
    pub fn close_all(&mut self) {
        if !self.clients.is_empty() {
            log::info!("closing {} relay clients", self.clients.len());
        }
        self.clients.clear();
    }
}

/// One delivery attempt. Failure means the client's socket task is gone; its
/// disconnect event is already on the way, so the record is left for that.
fn deliver(slot: ConnectionSlot, record: &ClientRecord, text: String) -> bool {
    match record.outbox.send(text) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("[WS] delivery to client {} failed; skipping", slot);
            false
        }
    }
}
