use crate::stats::GossipStats;
use crate::table::PeerTable;
use crate::wire::encode_announce;
use crate::GossipError;

use rand::Rng;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Timing discipline for the transmit loop: a base interval plus uniform
/// random jitter in `[0, max_jitter)`.
///
/// The interval is atomic so the embedding application can retune it while
/// the loop runs; it is re-read every cycle.
#[derive(Debug)]
pub struct Cadence {
    interval_ms: AtomicU64,
    max_jitter_ms: u64,
}

impl Cadence {
    pub fn new(interval: Duration, max_jitter: Duration) -> Self {
        Self {
            interval_ms: AtomicU64::new(saturating_millis(interval)),
            max_jitter_ms: saturating_millis(max_jitter),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(saturating_millis(interval), Ordering::Relaxed);
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    /// Pause before the next sweep: interval + uniform(0, max_jitter).
    pub fn next_pause(&self) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..self.max_jitter_ms)
        };
        self.interval() + Duration::from_millis(jitter)
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Periodically pushes the whole known peer list to every known peer.
///
/// Each sweep sends one 4-byte datagram per (target, announced) pair of the
/// current snapshot, the target itself included, so a sweep costs n² sends.
pub struct Transmitter {
    table: Arc<PeerTable>,
    socket: Arc<UdpSocket>,
    dest_port: u16,
    cadence: Arc<Cadence>,
    stats: Arc<GossipStats>,
}

impl Transmitter {
    pub fn new(
        table: Arc<PeerTable>,
        socket: Arc<UdpSocket>,
        dest_port: u16,
        cadence: Arc<Cadence>,
        stats: Arc<GossipStats>,
    ) -> Self {
        Self {
            table,
            socket,
            dest_port,
            cadence,
            stats,
        }
    }

    /// Run sweeps until `cancel` fires.
    ///
    /// Fails with [`GossipError::NoSeedPeers`] before sending anything when the
    /// table is empty. A sweep in flight always completes; the pause between
    /// sweeps is cut short by cancellation.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), GossipError> {
        if self.table.is_empty() {
            return Err(GossipError::NoSeedPeers);
        }

        tracing::info!(
            "Starting gossip transmission to port {} ({} seed peers)",
            self.dest_port,
            self.table.len()
        );

        while !cancel.is_cancelled() {
            self.sweep().await;

            let pause = self.cadence.next_pause();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Inter-cycle sleep interrupted, leaving transmit loop");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!("Gossip transmission stopped");
        Ok(())
    }

    /// One full dissemination of the current snapshot. Returns the number of
    /// datagrams sent successfully.
    pub async fn sweep(&self) -> usize {
        let peers = self.table.snapshot();
        let mut sent = 0;

        for target in &peers {
            let dest = SocketAddr::V4(SocketAddrV4::new(*target, self.dest_port));
            for announced in &peers {
                let payload = encode_announce(*announced);
                match self.socket.send_to(&payload, dest).await {
                    Ok(_) => {
                        sent += 1;
                        self.stats.record_sent();
                    }
                    Err(e) => {
                        self.stats.record_send_error();
                        tracing::error!("Failed to send gossip packet to {dest}: {e}");
                    }
                }
            }
        }

        self.stats.record_cycle();
        tracing::debug!("Gossip sweep: {sent} datagrams to {} peers", peers.len());
        sent
    }
}
