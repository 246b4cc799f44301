//! Discovery datagram format.
//!
//! One datagram type: exactly [`PAYLOAD_SIZE`] bytes holding a raw
//! big-endian IPv4 address. No header, no version byte, no checksum.

use crate::GossipError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Size of a discovery announcement on the wire.
pub const PAYLOAD_SIZE: usize = 4;

/// Encode a peer address as an announcement payload.
pub fn encode_announce(peer: Ipv4Addr) -> [u8; PAYLOAD_SIZE] {
    peer.octets()
}

/// Decode an announcement payload.
///
/// Anything that is not exactly [`PAYLOAD_SIZE`] bytes is rejected.
pub fn decode_announce(data: &[u8]) -> Result<Ipv4Addr, GossipError> {
    let octets: [u8; PAYLOAD_SIZE] = data
        .try_into()
        .map_err(|_| GossipError::MalformedPayload { len: data.len() })?;
    Ok(Ipv4Addr::from(octets))
}

/// Encode a `u64` as 8 big-endian bytes.
///
/// Not used by the 4-byte announcement path; available for payload extensions.
pub fn encode_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode the first 8 bytes of `data` as a big-endian `u64`.
pub fn decode_u64(data: &[u8]) -> Result<u64, GossipError> {
    let bytes: [u8; 8] = data
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or(GossipError::MalformedPayload { len: data.len() })?;
    Ok(u64::from_be_bytes(bytes))
}

/// The IPv4 address a datagram came from, if it has one.
///
/// IPv4-mapped IPv6 sources (dual-stack sockets) are unwrapped.
pub fn ipv4_source(addr: SocketAddr) -> Option<Ipv4Addr> {
    match addr.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_announce_is_network_order() {
        let payload = encode_announce(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(payload, [10, 1, 2, 3]);
        assert_eq!(decode_announce(&payload).unwrap(), Ipv4Addr::new(10, 1, 2, 3));
    }

    #[test]
    fn test_decode_rejects_short_and_long() {
        for len in [0usize, 1, 3, 5, 16] {
            let data = vec![1u8; len];
            match decode_announce(&data) {
                Err(GossipError::MalformedPayload { len: got }) => assert_eq!(got, len),
                other => panic!("expected MalformedPayload for {len} bytes, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_u64_codec_big_endian() {
        let bytes = encode_u64(0x0102_0304_0506_0708);
        assert_eq!(bytes, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(decode_u64(&bytes).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(decode_u64(&[0xff; 8]).unwrap(), u64::MAX);
    }

    #[test]
    fn test_decode_u64_short_input() {
        assert!(matches!(
            decode_u64(&[0u8; 7]),
            Err(GossipError::MalformedPayload { len: 7 })
        ));
    }

    #[test]
    fn test_ipv4_source() {
        let v4: SocketAddr = "192.168.1.9:50002".parse().unwrap();
        assert_eq!(ipv4_source(v4), Some(Ipv4Addr::new(192, 168, 1, 9)));

        let mapped = SocketAddr::new(
            IpAddr::V6(Ipv4Addr::new(10, 0, 0, 7).to_ipv6_mapped()),
            50002,
        );
        assert_eq!(ipv4_source(mapped), Some(Ipv4Addr::new(10, 0, 0, 7)));

        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 50002);
        assert_eq!(ipv4_source(v6), None);
    }
}
