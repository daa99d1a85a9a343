//! Wildcard DNS (captive-portal pattern): every name resolves to the gateway.

pub mod packet;
mod resolver;

pub use packet::PacketError;
pub use resolver::WildcardResolver;
