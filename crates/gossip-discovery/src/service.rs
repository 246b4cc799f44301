use crate::config::GossipConfig;
use crate::receiver::Receiver;
use crate::stats::{GossipStats, StatsSnapshot};
use crate::table::{PeerRecord, PeerTable};
use crate::transmitter::{Cadence, Transmitter};
use crate::wire::ipv4_source;
use crate::GossipError;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`GossipService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, loops not started.
    Created,
    /// Receive and transmit loops are running.
    Running,
    /// Stop requested; the transmit loop has not exited yet.
    Stopping,
    /// Transmit loop has exited (or the service was stopped before starting).
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Created => write!(f, "CREATED"),
            ServiceState::Running => write!(f, "RUNNING"),
            ServiceState::Stopping => write!(f, "STOPPING"),
            ServiceState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// `IP_TOS` value for gossip traffic (the "high reliability" bit).
pub const GOSSIP_TOS: u32 = 0x04;

/// Mark outgoing gossip datagrams with [`GOSSIP_TOS`]. Failure is logged
/// and ignored; the network may rewrite or drop the field anyway.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
))]
fn mark_traffic_class(socket: &UdpSocket) {
    if let Err(e) = socket.set_tos_v4(GOSSIP_TOS) {
        tracing::warn!("Could not set IP_TOS {GOSSIP_TOS:#04x} on gossip socket: {e}");
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd"
)))]
fn mark_traffic_class(_socket: &UdpSocket) {}

struct Tasks {
    receiver: JoinHandle<()>,
    transmitter: JoinHandle<()>,
}

/// A gossip discovery node — seed, start, query peers, stop.
///
/// This is the main entry point for embedding applications. It owns the
/// [`PeerTable`] and runs one receive task and one transmit task over a
/// single UDP socket.
pub struct GossipService {
    config: GossipConfig,
    table: Arc<PeerTable>,
    stats: Arc<GossipStats>,
    cadence: Arc<Cadence>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<ServiceState>>,
    tasks: Mutex<Option<Tasks>>,
    local_addr: OnceLock<SocketAddr>,
}

impl GossipService {
    /// Create a service. Nothing is bound until [`start`](Self::start).
    pub fn new(config: GossipConfig) -> Self {
        let cadence = Arc::new(Cadence::new(config.interval, config.max_jitter));
        let (state_tx, _) = watch::channel(ServiceState::Created);

        Self {
            config,
            table: Arc::new(PeerTable::new()),
            stats: Arc::new(GossipStats::new()),
            cadence,
            cancel: CancellationToken::new(),
            state_tx: Arc::new(state_tx),
            tasks: Mutex::new(None),
            local_addr: OnceLock::new(),
        }
    }

    /// Add a known peer. Works before and after start; never downgrades an
    /// existing entry. Returns `true` if the peer was new.
    pub fn add_peer(&self, peer: Ipv4Addr) -> bool {
        let added = self.table.seed(peer);
        if added {
            tracing::debug!("Seeded peer {peer}");
        }
        added
    }

    /// Add a known peer by IPv4 literal or host name.
    ///
    /// Host names are resolved and the first IPv4 result is used.
    pub async fn add_known_peer(&self, host: &str) -> Result<Ipv4Addr, GossipError> {
        let peer = match host.parse::<Ipv4Addr>() {
            Ok(ip) => ip,
            Err(_) => tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| GossipError::InvalidAddress(format!("{host}: {e}")))?
                .filter_map(ipv4_source)
                .next()
                .ok_or_else(|| GossipError::InvalidAddress(format!("{host}: no IPv4 address")))?,
        };
        self.add_peer(peer);
        Ok(peer)
    }

    /// Currently known peer addresses.
    pub fn peers(&self) -> Vec<Ipv4Addr> {
        self.table.snapshot()
    }

    /// Currently known peers with their contact state.
    pub fn records(&self) -> Vec<PeerRecord> {
        self.table.records()
    }

    /// Shared handle to the peer table.
    pub fn table(&self) -> Arc<PeerTable> {
        self.table.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn state(&self) -> ServiceState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state_tx.subscribe()
    }

    /// The bound socket address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Change the base interval between sweeps. Takes effect at the next pause.
    pub fn set_interval(&self, interval: Duration) {
        self.cadence.set_interval(interval);
        tracing::debug!("Gossip interval set to {interval:?}");
    }

    pub fn interval(&self) -> Duration {
        self.cadence.interval()
    }

    /// Bind the socket and spawn the receive and transmit loops.
    ///
    /// Fails with [`GossipError::NoSeedPeers`] if no peer is known, and with
    /// [`GossipError::Bind`] if the socket cannot be set up. In both cases no
    /// traffic is sent and the service stays startable.
    pub async fn start(&self) -> Result<(), GossipError> {
        let mut tasks = self.tasks.lock().await;

        match self.state() {
            ServiceState::Created => {}
            ServiceState::Running | ServiceState::Stopping => {
                return Err(GossipError::AlreadyStarted)
            }
            ServiceState::Stopped => return Err(GossipError::Stopped),
        }

        if self.table.is_empty() {
            tracing::error!("Refusing to start gossip service: no seed peers");
            return Err(GossipError::NoSeedPeers);
        }

        let addr = self.config.bind_socket_addr();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| GossipError::Bind { addr, source })?;
        mark_traffic_class(&socket);
        if self.config.broadcast {
            socket
                .set_broadcast(true)
                .map_err(|source| GossipError::Bind { addr, source })?;
        }
        let local = socket
            .local_addr()
            .map_err(|source| GossipError::Bind { addr, source })?;
        let _ = self.local_addr.set(local);

        let dest_port = self.config.dest_port.unwrap_or(local.port());
        let socket = Arc::new(socket);

        // A concurrent stop() may have moved Created to Stopped while we were binding.
        self.mark_running()?;
        tracing::info!("Gossip service listening on {local}, sending to port {dest_port}");

        let receiver = Receiver::new(self.table.clone(), socket.clone(), self.stats.clone());
        let receiver = tokio::spawn(receiver.run(self.cancel.clone()));

        let transmitter = Transmitter::new(
            self.table.clone(),
            socket,
            dest_port,
            self.cadence.clone(),
            self.stats.clone(),
        );
        let cancel = self.cancel.clone();
        let state_tx = self.state_tx.clone();
        let transmitter = tokio::spawn(async move {
            if let Err(e) = transmitter.run(cancel).await {
                tracing::error!("Gossip transmission aborted: {e}");
            }
            state_tx.send_replace(ServiceState::Stopped);
        });

        *tasks = Some(Tasks {
            receiver,
            transmitter,
        });
        Ok(())
    }

    /// Created -> Running, and nothing else.
    fn mark_running(&self) -> Result<(), GossipError> {
        let promoted = self.state_tx.send_if_modified(|state| {
            if *state == ServiceState::Created {
                *state = ServiceState::Running;
                true
            } else {
                false
            }
        });
        if promoted {
            Ok(())
        } else {
            Err(GossipError::Stopped)
        }
    }

    /// Signal both loops to stop.
    ///
    /// With `wait`, returns only once the transmit loop has exited, then
    /// aborts the receive task if it is still around. Worst case this spans
    /// one broadcast sweep.
    pub async fn stop(&self, wait: bool) {
        self.cancel.cancel();
        self.state_tx.send_if_modified(|state| match state {
            ServiceState::Running => {
                *state = ServiceState::Stopping;
                true
            }
            ServiceState::Created => {
                *state = ServiceState::Stopped;
                true
            }
            _ => false,
        });
        tracing::info!("Stopping gossip service");

        if !wait {
            return;
        }

        let mut state_rx = self.state_tx.subscribe();
        let _ = state_rx
            .wait_for(|state| *state == ServiceState::Stopped)
            .await;

        if let Some(tasks) = self.tasks.lock().await.take() {
            if !tasks.receiver.is_finished() {
                tasks.receiver.abort();
            }
            let _ = tasks.transmitter.await;
        }
        tracing::info!("Gossip service stopped");
    }
}

impl Drop for GossipService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for GossipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipService")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("peers", &self.table.len())
            .finish()
    }
}
