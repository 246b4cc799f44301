use crate::GossipError;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

/// Default port used by `GossipConfig::from_env` when `GOSSIP_PORT` is unset.
pub const DEFAULT_PORT: u16 = 50002;
/// Default base interval between broadcast sweeps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
/// Default upper bound of the random delay added to each interval.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(100);

/// Configuration for a [`GossipService`](crate::GossipService).
///
/// Use the builder pattern:
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use std::time::Duration;
/// use gossip_discovery::GossipConfig;
///
/// let config = GossipConfig::new(Ipv4Addr::UNSPECIFIED, 50002)
///     .interval(Duration::from_millis(250))
///     .dest_port(50003);
/// ```
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Local address the gossip socket binds to.
    pub(crate) bind_addr: Ipv4Addr,
    /// Local port. `0` lets the OS pick one.
    pub(crate) port: u16,
    /// Port announcements are sent to. `None` means "same as the bound port".
    pub(crate) dest_port: Option<u16>,
    /// Base interval between broadcast sweeps.
    pub(crate) interval: Duration,
    /// Upper bound (exclusive) of the jitter added to each interval.
    pub(crate) max_jitter: Duration,
    /// Enable `SO_BROADCAST` so broadcast addresses can be used as peers.
    pub(crate) broadcast: bool,
}

impl GossipConfig {
    /// Create a config with defaults.
    ///
    /// If the `GOSSIP_INTERVAL_MS` environment variable holds a valid number
    /// it replaces the default interval. This can be overridden with
    /// [`.interval()`](Self::interval).
    ///
    /// Unlike [`from_env`](Self::from_env), a malformed value is not an error
    /// here: it is logged at `warn` and the default is kept.
    pub fn new(bind_addr: Ipv4Addr, port: u16) -> Self {
        let interval = interval_or_default("GOSSIP_INTERVAL_MS");

        Self {
            bind_addr,
            port,
            dest_port: None,
            interval,
            max_jitter: DEFAULT_MAX_JITTER,
            broadcast: false,
        }
    }

    /// Build a config from `GOSSIP_*` environment variables.
    ///
    /// - `GOSSIP_BIND` (default `0.0.0.0`)
    /// - `GOSSIP_PORT` (default `50002`)
    /// - `GOSSIP_DEST_PORT` (default: the bound port)
    /// - `GOSSIP_INTERVAL_MS` (default `1000`)
    /// - `GOSSIP_MAX_JITTER_MS` (default `100`)
    pub fn from_env() -> Result<Self, GossipError> {
        let bind_addr = env_or("GOSSIP_BIND", Ipv4Addr::UNSPECIFIED)?;
        let port = env_or("GOSSIP_PORT", DEFAULT_PORT)?;
        let mut config = Self::new(bind_addr, port);

        if let Some(dest) = env_opt::<u16>("GOSSIP_DEST_PORT")? {
            config = config.dest_port(dest);
        }
        if let Some(ms) = env_opt::<u64>("GOSSIP_INTERVAL_MS")? {
            config = config.interval(Duration::from_millis(ms));
        }
        if let Some(ms) = env_opt::<u64>("GOSSIP_MAX_JITTER_MS")? {
            config = config.max_jitter(Duration::from_millis(ms));
        }
        Ok(config)
    }

    /// Set the base interval between sweeps (default: 1 s).
    ///
    /// A small interval speeds up initial discovery; a larger one cuts
    /// steady-state chatter. Can also be changed at runtime with
    /// [`GossipService::set_interval`](crate::GossipService::set_interval).
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the jitter bound (default: 100 ms). Zero disables jitter.
    pub fn max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Send announcements to this port instead of the bound one.
    pub fn dest_port(mut self, port: u16) -> Self {
        self.dest_port = Some(port);
        self
    }

    /// Allow sending to broadcast addresses (sets `SO_BROADCAST`).
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// The socket address the service binds to.
    pub fn bind_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.bind_addr, self.port))
    }
}

fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>, GossipError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GossipError::Config(format!("{key}={raw:?} is not valid"))),
        Err(_) => Ok(None),
    }
}

fn interval_or_default(key: &str) -> Duration {
    match env_opt::<u64>(key) {
        Ok(Some(ms)) => Duration::from_millis(ms),
        Ok(None) => DEFAULT_INTERVAL,
        Err(e) => {
            tracing::warn!("{e}, using default interval {DEFAULT_INTERVAL:?}");
            DEFAULT_INTERVAL
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, GossipError> {
    Ok(env_opt(key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = GossipConfig::new(Ipv4Addr::LOCALHOST, 4000)
            .interval(Duration::from_millis(20))
            .max_jitter(Duration::ZERO)
            .dest_port(4001)
            .broadcast(true);

        assert_eq!(config.interval, Duration::from_millis(20));
        assert_eq!(config.max_jitter, Duration::ZERO);
        assert_eq!(config.dest_port, Some(4001));
        assert!(config.broadcast);
        assert_eq!(
            config.bind_socket_addr(),
            "127.0.0.1:4000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_defaults() {
        let config = GossipConfig::new(Ipv4Addr::UNSPECIFIED, 0);
        assert_eq!(config.dest_port, None);
        assert_eq!(config.max_jitter, DEFAULT_MAX_JITTER);
        assert!(!config.broadcast);
    }

    #[test]
    fn test_env_parsing_rejects_garbage() {
        // Unique key so parallel tests never observe it.
        std::env::set_var("GOSSIP_TEST_BAD_PORT", "not-a-port");
        let result = env_opt::<u16>("GOSSIP_TEST_BAD_PORT");
        std::env::remove_var("GOSSIP_TEST_BAD_PORT");
        assert!(matches!(result, Err(GossipError::Config(_))));
    }

    #[test]
    fn test_malformed_interval_falls_back_to_default() {
        std::env::set_var("GOSSIP_TEST_BAD_INTERVAL", "soon");
        let interval = interval_or_default("GOSSIP_TEST_BAD_INTERVAL");
        std::env::remove_var("GOSSIP_TEST_BAD_INTERVAL");
        assert_eq!(interval, DEFAULT_INTERVAL);

        std::env::set_var("GOSSIP_TEST_GOOD_INTERVAL", "250");
        let interval = interval_or_default("GOSSIP_TEST_GOOD_INTERVAL");
        std::env::remove_var("GOSSIP_TEST_GOOD_INTERVAL");
        assert_eq!(interval, Duration::from_millis(250));
    }

    #[test]
    fn test_from_env_defaults() {
        let config = GossipConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.dest_port, None);
    }

    #[test]
    fn test_env_missing_uses_default() {
        let port = env_or("GOSSIP_TEST_UNSET_PORT", 1234u16).unwrap();
        assert_eq!(port, 1234);
    }
}
