//! Wildcard name resolver: every query is answered with the gateway's address.

use crate::dns::packet;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Largest datagram read; plain DNS over UDP is capped at 512 bytes, EDNS clients may send more.
const MAX_DATAGRAM: usize = 1500;

/// Authoritative responder for the whole namespace. Stateless across requests.
pub struct WildcardResolver {
    socket: UdpSocket,
    address: Ipv4Addr,
    ttl: u32,
    buf: Box<[u8]>,
}

impl WildcardResolver {
    pub async fn bind(addr: SocketAddr, address: Ipv4Addr, ttl: u32) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        log::info!("DNS server started on {}", socket.local_addr()?);
        log::info!("wildcard DNS: any domain -> {}", address);
        Ok(Self {
            socket,
            address,
            ttl,
            buf: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Completes when a datagram may be waiting. Spurious wakeups are possible.
    pub async fn readable(&self) -> io::Result<()> {
        self.socket.readable().await
    }

    /// Answer up to `budget` queued datagrams without blocking. Returns the number answered.
    /// Malformed datagrams are dropped; socket errors end this pass but are not fatal.
    pub fn process_pending(&mut self, budget: usize) -> usize {
        let mut answered = 0;
        for _ in 0..budget {
            let (len, peer) = match self.socket.try_recv_from(&mut self.buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("dns recv failed: {}", e);
                    break;
                }
            };
            let response = match packet::respond(&self.buf[..len], self.address, self.ttl) {
                Ok(r) => r,
                Err(e) => {
                    log::debug!("dns: dropping datagram from {}: {}", peer, e);
                    continue;
                }
            };
            match self.socket.try_send_to(&response, peer) {
                Ok(_) => answered += 1,
                Err(e) => log::debug!("dns: reply to {} failed: {}", peer, e),
            }
        }
        answered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn answers_any_name_with_gateway_address() {
        let gateway = Ipv4Addr::new(10, 0, 0, 1);
        let mut resolver = WildcardResolver::bind("127.0.0.1:0".parse().unwrap(), gateway, 30)
            .await
            .unwrap();
        let server = resolver.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[1, 2, 3], server).await.unwrap();
        client
            .send_to(&packet::encode_query(42, "www.apple.com", packet::TYPE_A), server)
            .await
            .unwrap();

        let mut answered = 0;
        for _ in 0..100 {
            answered += resolver.process_pending(8);
            if answered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(answered, 1, "garbage must be dropped, the query answered");

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[0..2], &42u16.to_be_bytes());
        assert_eq!(&buf[len - 4..len], &gateway.octets());
    }

    #[tokio::test]
    async fn empty_queue_returns_immediately() {
        let mut resolver = WildcardResolver::bind(
            "127.0.0.1:0".parse().unwrap(),
            Ipv4Addr::LOCALHOST,
            60,
        )
        .await
        .unwrap();
        assert_eq!(resolver.process_pending(16), 0);
    }
}
