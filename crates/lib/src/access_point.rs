//! Access point collaborator: who provides the gateway's address and the station count.
//!
//! Bringing the access point up (and avoiding SSID collisions) happens outside this
//! process. The gateway only needs to know the address once it exists.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the gateway needs from the access point.
pub trait AccessPoint: Send + Sync {
    /// The access point's IPv4 address, or `None` until it has one.
    fn address(&self) -> Option<Ipv4Addr>;

    /// Stations currently associated with the access point.
    fn station_count(&self) -> usize;

    fn ssid(&self) -> &str;
}

/// Access point described by configuration. The station count is pushed in by
/// whatever supervises the real access point (0 when nothing does).
#[derive(Debug)]
pub struct StaticAccessPoint {
    ssid: String,
    address: Option<Ipv4Addr>,
    stations: AtomicUsize,
}

impl StaticAccessPoint {
    pub fn new(ssid: impl Into<String>, address: Option<Ipv4Addr>) -> Self {
        Self {
            ssid: ssid.into(),
            address,
            stations: AtomicUsize::new(0),
        }
    }

    pub fn set_station_count(&self, count: usize) {
        self.stations.store(count, Ordering::Relaxed);
    }
}

impl AccessPoint for StaticAccessPoint {
    fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    fn station_count(&self) -> usize {
        self.stations.load(Ordering::Relaxed)
    }

    fn ssid(&self) -> &str {
        &self.ssid
    }
}
