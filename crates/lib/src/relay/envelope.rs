//! Relay envelope: the JSON objects exchanged over the WebSocket.
//!
//! Client-authored messages are relayed as opaque text; the hub only looks for a
//! top-level `uuid` string. Server-authored messages are the two variants below.

use crate::relay::slots::ConnectionSlot;
use serde::{Deserialize, Serialize};

/// Greeting sent to a newly connected client.
pub const WELCOME_MESSAGE: &str = "Welcome to LAN Party Arcade!";

/// Messages the gateway itself sends, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// `{ "type": "connected", "message", "clientNum", "timestamp" }`, to the new client only.
    Connected {
        message: String,
        #[serde(rename = "clientNum")]
        client_num: ConnectionSlot,
        timestamp: u64,
    },
    /// `{ "type": "player_disconnected", "uuid", "timestamp" }`, to everyone still connected.
    /// `uuid` is empty when the client never announced an identity.
    PlayerDisconnected { uuid: String, timestamp: u64 },
}

impl ServerEnvelope {
    pub fn connected(slot: ConnectionSlot, timestamp: u64) -> Self {
        Self::Connected {
            message: WELCOME_MESSAGE.to_string(),
            client_num: slot,
            timestamp,
        }
    }

    pub fn player_disconnected(uuid: impl Into<String>, timestamp: u64) -> Self {
        Self::PlayerDisconnected {
            uuid: uuid.into(),
            timestamp,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }
}

/// The identity a client message announces: a non-empty top-level `uuid` string.
/// `None` for anything else, including text that is not JSON or not an object.
pub fn announced_identity(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value
        .get("uuid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
