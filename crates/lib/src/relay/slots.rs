//! Connection slots: small integers issued by the transport, reused after release.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Transport-assigned id of one open WebSocket. Unique only among open connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionSlot(pub u8);

impl std::fmt::Display for ConnectionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed pool of slots; `acquire` hands out the lowest free one.
#[derive(Debug)]
pub struct SlotAllocator {
    in_use: Mutex<Vec<bool>>,
}

impl SlotAllocator {
    pub fn new(capacity: u8) -> Arc<Self> {
        Arc::new(Self {
            in_use: Mutex::new(vec![false; capacity as usize]),
        })
    }

    fn slots(&self) -> MutexGuard<'_, Vec<bool>> {
        self.in_use.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lowest free slot, or `None` when every slot is taken. The lease frees the slot on drop.
    pub fn acquire(self: &Arc<Self>) -> Option<SlotLease> {
        let mut slots = self.slots();
        let index = slots.iter().position(|used| !used)?;
        slots[index] = true;
        Some(SlotLease {
            slot: ConnectionSlot(index as u8),
            allocator: Arc::clone(self),
        })
    }

    pub fn in_use(&self) -> usize {
        self.slots().iter().filter(|used| **used).count()
    }

    fn release(&self, slot: ConnectionSlot) {
        if let Some(used) = self.slots().get_mut(slot.0 as usize) {
            *used = false;
        }
    }
}

/// Ownership of one slot. Dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct SlotLease {
    slot: ConnectionSlot,
    allocator: Arc<SlotAllocator>,
}

impl SlotLease {
    pub fn slot(&self) -> ConnectionSlot {
        self.slot
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.allocator.release(self.slot);
    }
}
