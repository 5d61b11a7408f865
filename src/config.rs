use std::time::Duration;

/// Default listening port of the shipping core (spec.md §4.6, §6).
pub const DEFAULT_PORT: u16 = 8198;

/// Statistics sampler cadence (spec.md §4.6).
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded wait for a CONNECT session to be claimed by LINK (spec.md §4.3, cmd 4).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between half-open polls on otherwise-idle sessions (spec.md §4.1, §5).
pub const HALF_OPEN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Builder for the broker's runtime configuration.
///
/// Mirrors the `with_*`-builder shape of `swarm_discovery::Discoverer`: a
/// plain struct with chainable setters and a `Default` impl carrying the
/// spec's constants, rather than a config file or environment variables.
#[derive(Clone, Copy, Debug)]
pub struct BrokerConfig {
    port: u16,
    stats_interval: Duration,
    connect_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            stats_interval: DEFAULT_STATS_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl BrokerConfig {
    /// Creates a config with all defaults from spec.md.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listening port. Default [`DEFAULT_PORT`].
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the statistics sampler cadence. Default [`DEFAULT_STATS_INTERVAL`].
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Sets the CONNECT bounded-wait timeout. Default [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn stats_interval(&self) -> Duration {
        self.stats_interval
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}
