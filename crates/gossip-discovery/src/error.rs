use std::net::SocketAddr;

/// Errors returned by the gossip discovery service.
///
/// Only configuration and socket setup failures reach the caller. Per-datagram
/// send and receive failures are logged and counted inside the loops.
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("no seed peers and multicast discovery not configured")]
    NoSeedPeers,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind gossip socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("malformed payload: {len} bytes")]
    MalformedPayload { len: usize },

    #[error("gossip service already started")]
    AlreadyStarted,

    #[error("gossip service is stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_no_seed_peers() {
        let err = GossipError::NoSeedPeers;
        assert_eq!(
            err.to_string(),
            "no seed peers and multicast discovery not configured"
        );
    }

    #[test]
    fn test_display_bind() {
        let err = GossipError::Bind {
            addr: "127.0.0.1:50002".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(
            err.to_string(),
            "failed to bind gossip socket on 127.0.0.1:50002: in use"
        );
    }

    #[test]
    fn test_display_malformed_payload() {
        let err = GossipError::MalformedPayload { len: 7 };
        assert_eq!(err.to_string(), "malformed payload: 7 bytes");
    }
}
