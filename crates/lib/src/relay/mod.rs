//! WebSocket relay: connection slots, the session hub, and its transport.
//!
//! Every text frame a client sends is relayed verbatim to every other client. The hub
//! remembers one identity per client (the first `uuid` it announces) so it can tell the
//! others who left.

mod envelope;
mod hub;
mod slots;
mod transport;

pub use envelope::{announced_identity, ServerEnvelope, WELCOME_MESSAGE};
pub use hub::{ClientRecord, Outbox, RelayEvent, RelayHub};
pub use slots::{ConnectionSlot, SlotAllocator, SlotLease};
pub use transport::RelayTransport;
