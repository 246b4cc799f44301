//! PeerTable — the discovery state shared by the receive and transmit loops.
//!
//! Maps each known IPv4 peer to the wall-clock time (Unix ms) of the last
//! datagram received directly from it, or to [`INDIRECT_SENTINEL`] when the
//! peer is known only because another peer announced it.
//!
//! Rules:
//! - entries are never removed
//! - a direct sighting always overwrites the timestamp
//! - an indirect sighting only ever creates, it never overwrites

use crate::now_ms;
use std::fmt;
use std::net::Ipv4Addr;

/// Raw timestamp stored for peers never contacted directly.
pub const INDIRECT_SENTINEL: i64 = -1;

/// How a peer is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastContact {
    /// Announced by another peer, never heard from directly.
    Indirect,
    /// Last datagram received directly from the peer at `at_ms` (Unix ms).
    Direct { at_ms: u64 },
}

impl LastContact {
    fn from_raw(raw: i64) -> Self {
        if raw < 0 {
            LastContact::Indirect
        } else {
            LastContact::Direct { at_ms: raw as u64 }
        }
    }

    /// Raw numeric form: Unix ms for direct peers, [`INDIRECT_SENTINEL`] otherwise.
    pub fn as_millis(&self) -> i64 {
        match self {
            LastContact::Indirect => INDIRECT_SENTINEL,
            LastContact::Direct { at_ms } => *at_ms as i64,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, LastContact::Direct { .. })
    }
}

impl fmt::Display for LastContact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastContact::Indirect => write!(f, "INDIRECT"),
            LastContact::Direct { at_ms } => write!(f, "DIRECT@{at_ms}"),
        }
    }
}

/// A peer address together with how it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PeerRecord {
    pub addr: Ipv4Addr,
    pub contact: LastContact,
}

/// Lock-free map of known peers.
///
/// Safe to share between one writer (the receive loop) and any number of
/// readers; no operation blocks.
pub struct PeerTable {
    peers: papaya::HashMap<Ipv4Addr, i64>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            peers: papaya::HashMap::new(),
        }
    }

    /// Record a datagram received directly from `addr`, stamped with now.
    ///
    /// Returns `true` if the peer was not known before.
    pub fn upsert_direct(&self, addr: Ipv4Addr) -> bool {
        self.upsert_direct_at(addr, now_ms())
    }

    /// Record a direct sighting at a specific time (for testing).
    pub fn upsert_direct_at(&self, addr: Ipv4Addr, at_ms: u64) -> bool {
        let at = i64::try_from(at_ms).unwrap_or(i64::MAX);
        self.peers.pin().insert(addr, at).is_none()
    }

    /// Record a peer announced in someone else's payload.
    ///
    /// Only creates the entry; an existing one (direct or indirect) is left
    /// untouched. Returns `true` if the entry was created.
    pub fn upsert_indirect(&self, addr: Ipv4Addr) -> bool {
        self.peers.pin().try_insert(addr, INDIRECT_SENTINEL).is_ok()
    }

    /// Add a known peer before (or after) start. Same rules as [`Self::upsert_indirect`].
    pub fn seed(&self, addr: Ipv4Addr) -> bool {
        self.upsert_indirect(addr)
    }

    /// Owned copy of all known addresses.
    ///
    /// The transmit loop iterates this copy, so nothing is held across sends.
    /// Concurrent inserts may or may not be included.
    pub fn snapshot(&self) -> Vec<Ipv4Addr> {
        self.peers.pin().keys().copied().collect()
    }

    /// Owned copy of all entries with their contact state.
    pub fn records(&self) -> Vec<PeerRecord> {
        self.peers
            .pin()
            .iter()
            .map(|(addr, raw)| PeerRecord {
                addr: *addr,
                contact: LastContact::from_raw(*raw),
            })
            .collect()
    }

    pub fn last_contact(&self, addr: &Ipv4Addr) -> Option<LastContact> {
        self.peers.pin().get(addr).map(|raw| LastContact::from_raw(*raw))
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.peers.pin().contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PeerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerTable").field("len", &self.len()).finish()
    }
}
