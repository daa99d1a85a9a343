//! Gateway start-up errors. Nothing after start-up is fatal.

use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("access point has no address yet")]
    AddressUnavailable,
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),
    #[error("binding {service} to {addr}: {source}")]
    Bind {
        service: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
