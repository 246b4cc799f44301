//! Gossip peer discovery over UDP.
//!
//! Nodes learn each other's IPv4 addresses without a central registry.
//! Every node periodically sends its whole known peer list to every known
//! peer, one fixed 4-byte datagram per announced address. A receiver records
//! the datagram source as a *direct* peer and the announced address as an
//! *indirect* one. Repeated sweeps converge all live nodes on the same peer
//! set (eventual consistency, no convergence deadline).
//!
//! Sweeps are spaced by a base interval plus up to 100 ms of random jitter
//! so nodes sharing an interval do not broadcast in lockstep.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//! use gossip_discovery::{GossipConfig, GossipService};
//!
//! # async fn example() -> Result<(), gossip_discovery::GossipError> {
//! let config = GossipConfig::new(Ipv4Addr::UNSPECIFIED, 50002)
//!     .interval(Duration::from_millis(500));
//! let service = GossipService::new(config);
//!
//! // At least one seed is required before start.
//! service.add_known_peer("10.0.0.12").await?;
//! service.start().await?;
//!
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! println!("known peers: {:?}", service.peers());
//!
//! service.stop(true).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod interfaces;
mod receiver;
mod service;
mod stats;
mod table;
mod transmitter;
pub mod wire;

pub use config::{GossipConfig, DEFAULT_INTERVAL, DEFAULT_MAX_JITTER, DEFAULT_PORT};
pub use error::GossipError;
pub use interfaces::broadcast_address;
pub use receiver::{Ingest, Receiver};
pub use service::{GossipService, ServiceState, GOSSIP_TOS};
pub use stats::{GossipStats, StatsSnapshot};
pub use table::{LastContact, PeerRecord, PeerTable, INDIRECT_SENTINEL};
pub use transmitter::{Cadence, Transmitter};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
