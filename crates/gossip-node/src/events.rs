use gossip_discovery::{PeerRecord, StatsSnapshot};
use serde::Serialize;
use std::io::Write;

pub use gossip_discovery::now_ms;

/// Emit a JSONL event to stdout (flushed immediately for piped output).
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();
    }
}

#[derive(Serialize)]
pub struct EventStarted {
    pub event: &'static str,
    pub local_addr: String,
    pub seeds: usize,
    pub interval_ms: u64,
    pub timestamp_ms: u64,
}

impl EventStarted {
    pub fn new(local_addr: String, seeds: usize, interval_ms: u64) -> Self {
        Self {
            event: "started",
            local_addr,
            seeds,
            interval_ms,
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Serialize)]
pub struct EventStats {
    pub event: &'static str,
    pub peers: usize,
    pub direct: usize,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    pub elapsed_s: f64,
}

impl EventStats {
    pub fn new(records: &[PeerRecord], counters: StatsSnapshot, elapsed_s: f64) -> Self {
        Self {
            event: "stats",
            peers: records.len(),
            direct: records.iter().filter(|r| r.contact.is_direct()).count(),
            counters,
            elapsed_s,
        }
    }
}

#[derive(Serialize)]
pub struct EventIntervalChange {
    pub event: &'static str,
    pub interval_ms: u64,
    pub elapsed_s: f64,
}

#[derive(Serialize)]
pub struct EventStopped {
    pub event: &'static str,
    pub peers: Vec<PeerRecord>,
    pub counters: StatsSnapshot,
    pub timestamp_ms: u64,
}

impl EventStopped {
    pub fn new(mut peers: Vec<PeerRecord>, counters: StatsSnapshot) -> Self {
        peers.sort_by_key(|p| p.addr);
        Self {
            event: "stopped",
            peers,
            counters,
            timestamp_ms: now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossip_discovery::LastContact;
    use std::net::Ipv4Addr;

    #[test]
    fn test_stats_event_counts_direct_peers() {
        let records = vec![
            PeerRecord {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                contact: LastContact::Direct { at_ms: 5 },
            },
            PeerRecord {
                addr: Ipv4Addr::new(10, 0, 0, 2),
                contact: LastContact::Indirect,
            },
        ];
        let event = EventStats::new(&records, StatsSnapshot::default(), 1.5);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "stats");
        assert_eq!(json["peers"], 2);
        assert_eq!(json["direct"], 1);
        assert_eq!(json["sent"], 0);
    }

    #[test]
    fn test_stopped_event_sorts_peers() {
        let records = vec![
            PeerRecord {
                addr: Ipv4Addr::new(10, 0, 0, 9),
                contact: LastContact::Indirect,
            },
            PeerRecord {
                addr: Ipv4Addr::new(10, 0, 0, 1),
                contact: LastContact::Direct { at_ms: 7 },
            },
        ];
        let event = EventStopped::new(records, StatsSnapshot::default());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["peers"][0]["addr"], "10.0.0.1");
        assert_eq!(json["peers"][0]["contact"]["kind"], "direct");
        assert_eq!(json["peers"][1]["contact"]["kind"], "indirect");
    }
}
