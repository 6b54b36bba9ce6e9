//! Server configuration (§6 "Configuration", §10 ambient stack).

use std::env;
use std::time::Duration;

use xenstore_ring::RingConfig;

/// `MAX_DOMAINS`: width of the worker-stack bitmap and the largest domid
/// this server will accept.
const DEFAULT_MAX_DOMAINS: u32 = 1024;

/// Safety-net poll interval for a guest worker (§4.E implementation note):
/// `Notify::notify_waiters` only wakes waiters registered at the moment it
/// fires, so a worker that checks the ring as empty and loses the race with
/// a concurrent write would otherwise block forever; the same hybrid
/// event-driven-plus-poll strategy the teacher uses for its stream receiver
/// bounds that window instead.
const DEFAULT_WORKER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Compiled-in defaults, overridable by environment variables, following
/// the teacher's plain-struct-with-`Default`-and-`with_*`-builders shape
/// rather than a file-based config format this system has no use for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Worker-stack slot count; also the largest domid accepted by `start`.
    pub max_domains: u32,
    /// Ring capacity in bytes, shared by the request and response rings.
    pub ring_size: u32,
    /// Maximum encoded length of an absolute path.
    pub abs_path_max: usize,
    /// Safety-net poll interval each guest worker falls back to.
    pub worker_poll_interval: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a config from compiled-in defaults overridden by
    /// `XENSTORE_MAX_DOMAINS` and `XENSTORE_RING_SIZE`, if set and
    /// well-formed. Malformed values are ignored and logged, not fatal.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("XENSTORE_MAX_DOMAINS") {
            match raw.parse() {
                Ok(value) => config.max_domains = value,
                Err(_) => tracing::warn!(raw, "ignoring malformed XENSTORE_MAX_DOMAINS"),
            }
        }

        if let Ok(raw) = env::var("XENSTORE_RING_SIZE") {
            match raw.parse::<u32>() {
                Ok(value) if value.is_power_of_two() => config.ring_size = value,
                _ => tracing::warn!(raw, "ignoring malformed XENSTORE_RING_SIZE"),
            }
        }

        config
    }

    #[must_use]
    pub fn with_max_domains(mut self, max_domains: u32) -> Self {
        self.max_domains = max_domains;
        self
    }

    #[must_use]
    pub fn with_ring_size(mut self, ring_size: u32) -> Self {
        self.ring_size = ring_size;
        self
    }

    #[must_use]
    pub fn ring_config(&self) -> RingConfig {
        RingConfig::new(self.ring_size)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_domains: DEFAULT_MAX_DOMAINS,
            ring_size: RingConfig::XENSTORE_RING_SIZE,
            abs_path_max: xenstore_store::ABS_PATH_MAX,
            worker_poll_interval: DEFAULT_WORKER_POLL_INTERVAL,
        }
    }
}
