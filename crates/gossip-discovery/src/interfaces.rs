//! Local interface lookup for broadcast-based seeding.
//!
//! The unicast core never calls this; it exists for callers that want to
//! seed the table with their LAN broadcast address instead of a list of
//! known peers.

use netdev::ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Find the broadcast address of the first non-loopback, multicast-capable
/// interface with an IPv4 network that has one.
pub fn broadcast_address() -> Option<Ipv4Addr> {
    for iface in netdev::get_interfaces() {
        if iface.is_loopback() || !iface.is_multicast() {
            continue;
        }
        for net in &iface.ipv4 {
            if let Some(broadcast) = broadcast_for(net) {
                tracing::debug!("Broadcast address {broadcast} on {}", iface.name);
                return Some(broadcast);
            }
        }
    }
    None
}

/// Directed broadcast address of `net`.
///
/// `/31` and `/32` networks have no broadcast address.
pub(crate) fn broadcast_for(net: &Ipv4Net) -> Option<Ipv4Addr> {
    if net.prefix_len() >= 31 {
        return None;
    }
    Some(net.broadcast())
}
