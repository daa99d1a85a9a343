//! LAN Party Arcade gateway library: wildcard DNS, static file serving with
//! captive-portal semantics, and a WebSocket relay for local multiplayer sessions.

pub mod access_point;
pub mod config;
pub mod dns;
pub mod gateway;
pub mod http;
pub mod init;
pub mod relay;
pub mod storage;
