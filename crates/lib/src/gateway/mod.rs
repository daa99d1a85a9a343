//! Gateway: wildcard DNS, HTTP file server, and WebSocket relay as one service.
//!
//! Start order is DNS, HTTP, relay. One cooperative loop ticks DNS and the relay hub;
//! the HTTP server answers on its own task.

mod error;
mod server;

pub use error::GatewayError;
pub use server::{shutdown_signal, Gateway, GatewayAddrs, TickStats};
