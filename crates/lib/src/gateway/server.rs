//! Gateway coordinator: starts DNS, HTTP, and the relay, and drives them from one loop.
//!
//! HTTP and the WebSocket listener run as tokio tasks. The DNS socket and the relay hub
//! are owned here and only ever touched from [`Gateway::tick`] and [`Gateway::run`], so
//! the client registry has a single owner and needs no lock.

use crate::access_point::AccessPoint;
use crate::config::Config;
use crate::dns::WildcardResolver;
use crate::gateway::error::GatewayError;
use crate::http;
use crate::relay::{RelayEvent, RelayHub, RelayTransport, SlotAllocator};
use crate::storage::StorageBackend;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Queue depth between socket tasks and the hub.
const RELAY_EVENT_QUEUE: usize = 256;

/// How long stop waits for each listener task to wind down.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Addresses the three services actually bound (ports resolved when configured as 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayAddrs {
    pub dns: SocketAddr,
    pub http: SocketAddr,
    pub ws: SocketAddr,
}

/// Work done by one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub dns_answered: usize,
    pub relay_events: usize,
}

/// The running gateway.
pub struct Gateway {
    dns: WildcardResolver,
    hub: RelayHub,
    events: mpsc::Receiver<RelayEvent>,
    access_point: Arc<dyn AccessPoint>,
    shutdown: CancellationToken,
    servers: Vec<(&'static str, JoinHandle<()>)>,
    addrs: GatewayAddrs,
    tick_budget: usize,
    status_interval: Duration,
}

async fn bind_tcp(service: &'static str, addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| GatewayError::Bind {
            service,
            addr,
            source,
        })
}

fn local_addr(service: &'static str, addr: SocketAddr, result: std::io::Result<SocketAddr>) -> Result<SocketAddr, GatewayError> {
    result.map_err(|source| GatewayError::Bind {
        service,
        addr,
        source,
    })
}

impl Gateway {
    /// Bind DNS, then HTTP, then the relay, and start serving once all three are bound.
    /// Fails when the access point has no address yet or a port cannot be bound.
    pub async fn start(
        config: &Config,
        access_point: Arc<dyn AccessPoint>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, GatewayError> {
        let address = access_point
            .address()
            .ok_or(GatewayError::AddressUnavailable)?;
        let g = &config.gateway;
        let bind: IpAddr = g
            .bind
            .trim()
            .parse()
            .map_err(|_| GatewayError::InvalidBind(g.bind.clone()))?;
        let epoch = Instant::now();
        let shutdown = CancellationToken::new();

        // All three sockets are bound before any listener task is spawned.
        log::info!("--- starting DNS server ---");
        let dns_addr = SocketAddr::new(bind, g.dns_port);
        let dns = WildcardResolver::bind(dns_addr, address, g.dns_ttl)
            .await
            .map_err(|source| GatewayError::Bind {
                service: "dns",
                addr: dns_addr,
                source,
            })?;
        let dns_bound = local_addr("dns", dns_addr, dns.local_addr())?;

        let http_addr = SocketAddr::new(bind, g.http_port);
        let http_listener = bind_tcp("http", http_addr).await?;
        let http_bound = local_addr("http", http_addr, http_listener.local_addr())?;

        let ws_addr = SocketAddr::new(bind, g.ws_port);
        let ws_listener = bind_tcp("relay", ws_addr).await?;
        let ws_bound = local_addr("relay", ws_addr, ws_listener.local_addr())?;

        log::info!("--- starting web server ---");
        let http_app = http::router(storage);
        let http_token = shutdown.clone();
        let http_task = tokio::spawn(async move {
            let result = axum::serve(http_listener, http_app)
                .with_graceful_shutdown(async move { http_token.cancelled().await })
                .await;
            if let Err(e) = result {
                log::error!("web server exited: {}", e);
            }
        });
        log::info!("web server started on {}", http_bound);

        log::info!("--- starting WebSocket server ---");
        let (events_tx, events) = mpsc::channel(RELAY_EVENT_QUEUE);
        let transport = RelayTransport::new(
            events_tx,
            SlotAllocator::new(g.max_clients),
            shutdown.clone(),
        );
        let ws_app = transport
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let ws_token = shutdown.clone();
        let ws_task = tokio::spawn(async move {
            let result = axum::serve(ws_listener, ws_app)
                .with_graceful_shutdown(async move { ws_token.cancelled().await })
                .await;
            if let Err(e) = result {
                log::error!("WebSocket server exited: {}", e);
            }
        });
        log::info!("WebSocket server started on {} ({} slots)", ws_bound, g.max_clients);

        log::info!(
            "gateway ready: ssid {}, address {}",
            access_point.ssid(),
            address
        );

        Ok(Self {
            dns,
            hub: RelayHub::new(epoch),
            events,
            access_point,
            shutdown,
            servers: vec![("http", http_task), ("relay", ws_task)],
            addrs: GatewayAddrs {
                dns: dns_bound,
                http: http_bound,
                ws: ws_bound,
            },
            tick_budget: g.tick_budget.max(1),
            status_interval: Duration::from_secs(g.status_interval_secs.max(1)),
        })
    }

    pub fn addrs(&self) -> GatewayAddrs {
        self.addrs
    }

    pub fn hub(&self) -> &RelayHub {
        &self.hub
    }

    pub fn client_count(&self) -> usize {
        self.hub.client_count()
    }

    /// Send `text` to every relay client; returns how many deliveries were queued.
    pub fn broadcast(&self, text: &str) -> usize {
        self.hub.broadcast(text)
    }

    /// Process whatever is pending, up to the tick budget per subsystem. Never waits.
    pub fn tick(&mut self) -> TickStats {
        let dns_answered = self.dns.process_pending(self.tick_budget);
        let mut relay_events = 0;
        while relay_events < self.tick_budget {
            match self.events.try_recv() {
                Ok(event) => {
                    self.hub.handle(event);
                    relay_events += 1;
                }
                Err(_) => break,
            }
        }
        TickStats {
            dns_answered,
            relay_events,
        }
    }

    fn log_status(&self) {
        let stations = self.access_point.station_count();
        let clients = self.hub.client_count();
        if stations > 0 || clients > 0 {
            log::info!("WiFi clients: {} | WebSocket clients: {}", stations, clients);
        }
    }

    /// Run the cooperative loop until `shutdown` completes, then stop.
    /// Each wakeup (DNS readable, relay event, status timer) is followed by a tick.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut status = tokio::time::interval(self.status_interval);
        status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        status.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                ready = self.dns.readable() => {
                    if let Err(e) = ready {
                        log::warn!("dns socket not readable: {}", e);
                    }
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        log::warn!("relay transport closed; stopping gateway");
                        break;
                    };
                    self.hub.handle(event);
                }
                _ = status.tick() => self.log_status(),
            }
            self.tick();
        }
        self.stop().await;
    }

    /// Best-effort stop: listeners stop accepting, open relay sockets are closed, the DNS
    /// socket is dropped. Queued deliveries may be lost.
    pub async fn stop(mut self) {
        log::info!("stopping gateway");
        self.shutdown.cancel();
        self.hub.close_all();
        for (service, handle) in self.servers.drain(..) {
            if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
                log::warn!("{} listener did not stop within {:?}", service, STOP_GRACE);
            }
        }
        log::info!("gateway stopped");
    }
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
