use crate::stats::GossipStats;
use crate::table::PeerTable;
use crate::wire::{decode_announce, ipv4_source, PAYLOAD_SIZE};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Larger than a valid announcement so an oversized datagram is never
/// truncated to a valid-looking 4 bytes. Anything that fills the buffer is
/// reported as at least this long.
const RECV_BUFFER_SIZE: usize = 64;

/// Pause after a receive error before trying again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What the receive loop did with one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Valid announcement: `source` was recorded as direct, `announced` as indirect.
    Accepted {
        source: Ipv4Addr,
        announced: Ipv4Addr,
    },
    /// Wrong payload size or non-IPv4 source; nothing recorded.
    Rejected,
}

/// Ingests discovery datagrams and records what they reveal in the table.
pub struct Receiver {
    table: Arc<PeerTable>,
    socket: Arc<UdpSocket>,
    stats: Arc<GossipStats>,
}

impl Receiver {
    pub fn new(table: Arc<PeerTable>, socket: Arc<UdpSocket>, stats: Arc<GossipStats>) -> Self {
        Self {
            table,
            socket,
            stats,
        }
    }

    /// Receive until `cancel` fires. I/O errors are logged and never end the loop.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Starting gossip reception on {}",
            self.socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unbound>".into())
        );

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.socket.recv_from(&mut buf) => r,
            };

            match received {
                Ok((len, src)) if len >= RECV_BUFFER_SIZE => {
                    self.stats.record_rejected();
                    tracing::warn!(
                        "Dropping oversized gossip datagram from {src}: \
                         at least {RECV_BUFFER_SIZE} bytes (expected {PAYLOAD_SIZE})"
                    );
                }
                Ok((len, src)) => {
                    self.ingest(&buf[..len], src);
                }
                Err(e) => {
                    self.stats.record_recv_error();
                    tracing::error!("Error receiving gossip packet: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("Gossip reception stopped");
    }

    /// Apply one datagram to the table.
    ///
    /// Policy for malformed input is reject-and-continue: a payload that is not
    /// exactly [`PAYLOAD_SIZE`] bytes, or a datagram from a non-IPv4 source,
    /// records nothing at all.
    pub fn ingest(&self, data: &[u8], src: SocketAddr) -> Ingest {
        let Some(source) = ipv4_source(src) else {
            self.stats.record_rejected();
            tracing::warn!("Dropping gossip datagram from non-IPv4 source {src}");
            return Ingest::Rejected;
        };

        let announced = match decode_announce(data) {
            Ok(addr) => addr,
            Err(e) => {
                self.stats.record_rejected();
                tracing::warn!(
                    "Dropping gossip datagram from {src}: {e} (expected {PAYLOAD_SIZE})"
                );
                return Ingest::Rejected;
            }
        };

        self.stats.record_received();

        if self.table.upsert_direct(source) {
            tracing::info!("Added direct peer: {source}");
        }
        if self.table.upsert_indirect(announced) {
            tracing::info!("Discovered new peer: {announced} (via {source})");
        }

        Ingest::Accepted { source, announced }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::LastContact;
    use std::net::{IpAddr, Ipv6Addr};

    async fn receiver() -> Receiver {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        Receiver::new(
            Arc::new(PeerTable::new()),
            socket,
            Arc::new(GossipStats::new()),
        )
    }

    fn from(ip: [u8; 4]) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), 50002)
    }

    #[tokio::test]
    async fn test_ingest_records_source_and_payload() {
        let rx = receiver().await;
        let outcome = rx.ingest(&[10, 0, 0, 9], from([10, 0, 0, 1]));

        assert_eq!(
            outcome,
            Ingest::Accepted {
                source: Ipv4Addr::new(10, 0, 0, 1),
                announced: Ipv4Addr::new(10, 0, 0, 9),
            }
        );
        assert!(rx
            .table
            .last_contact(&Ipv4Addr::new(10, 0, 0, 1))
            .unwrap()
            .is_direct());
        assert_eq!(
            rx.table.last_contact(&Ipv4Addr::new(10, 0, 0, 9)),
            Some(LastContact::Indirect)
        );
        assert_eq!(rx.stats.snapshot().received, 1);
    }

    #[tokio::test]
    async fn test_self_announcement_stays_direct() {
        let rx = receiver().await;
        rx.ingest(&[10, 0, 0, 1], from([10, 0, 0, 1]));

        assert_eq!(rx.table.len(), 1);
        assert!(rx
            .table
            .last_contact(&Ipv4Addr::new(10, 0, 0, 1))
            .unwrap()
            .is_direct());
    }

    #[tokio::test]
    async fn test_payload_does_not_downgrade_direct_peer() {
        let rx = receiver().await;
        rx.table.upsert_direct_at(Ipv4Addr::new(10, 0, 0, 2), 777);

        rx.ingest(&[10, 0, 0, 2], from([10, 0, 0, 3]));

        assert_eq!(
            rx.table.last_contact(&Ipv4Addr::new(10, 0, 0, 2)),
            Some(LastContact::Direct { at_ms: 777 })
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_records_nothing() {
        let rx = receiver().await;

        assert_eq!(rx.ingest(&[1, 2, 3], from([10, 0, 0, 1])), Ingest::Rejected);
        assert_eq!(rx.ingest(&[1, 2, 3, 4, 5], from([10, 0, 0, 1])), Ingest::Rejected);
        assert_eq!(rx.ingest(&[], from([10, 0, 0, 1])), Ingest::Rejected);

        assert!(rx.table.is_empty());
        assert_eq!(rx.stats.snapshot().rejected, 3);
        assert_eq!(rx.stats.snapshot().received, 0);
    }

    #[tokio::test]
    async fn test_run_drops_oversized_and_keeps_receiving() {
        let rx = receiver().await;
        let rx_addr = rx.socket.local_addr().unwrap();
        let table = rx.table.clone();
        let stats = rx.stats.clone();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(rx.run(cancel.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[7u8; 1000], rx_addr).await.unwrap();
        sender.send_to(&[10, 0, 0, 9], rx_addr).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while stats.snapshot().received == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("valid datagram never ingested");

        assert_eq!(stats.snapshot().rejected, 1);
        assert!(table.contains(&Ipv4Addr::LOCALHOST));
        assert!(table.contains(&Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(table.len(), 2);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("receiver did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_ipv6_source_is_rejected() {
        let rx = receiver().await;
        let src = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 50002);

        assert_eq!(rx.ingest(&[10, 0, 0, 9], src), Ingest::Rejected);
        assert!(rx.table.is_empty());
    }
}
