use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::RingConfig;
use crate::ring::ByteRing;

/// `XENSTORE_SERVER_FEATURE_RECONNECTION`, set in `server_features` on startup.
pub const SERVER_FEATURE_RECONNECTION: u32 = 1;

/// `XENSTORE_CONNECTED`, the only `connection` value this server ever sets.
pub const CONNECTED: u32 = 1;

/// The shared-memory layout a guest and the server both map (§6 "Ring layout").
///
/// `req` carries guest→server request bytes, `rsp` carries server→guest
/// response bytes; each direction owns its own producer/consumer pair, which
/// is why the ring codec (`ByteRing`) is a standalone type rather than
/// something this struct open-codes twice.
pub struct DomainInterface {
    pub req: ByteRing,
    pub rsp: ByteRing,
    server_features: AtomicU32,
    connection: AtomicU32,
}

impl DomainInterface {
    #[must_use]
    pub fn new(config: RingConfig) -> Self {
        Self {
            req: ByteRing::new(config),
            rsp: ByteRing::new(config),
            server_features: AtomicU32::new(0),
            connection: AtomicU32::new(0),
        }
    }

    /// Marks the interface connected and reconnection-capable, the two
    /// header fields `start(guest)` is responsible for (§4.G).
    pub fn mark_connected(&self) {
        self.server_features.store(SERVER_FEATURE_RECONNECTION, Ordering::Release);
        self.connection.store(CONNECTED, Ordering::Release);
    }

    #[must_use]
    pub fn server_features(&self) -> u32 {
        self.server_features.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn connection(&self) -> u32 {
        self.connection.load(Ordering::Acquire)
    }
}

impl Default for DomainInterface {
    fn default() -> Self {
        Self::new(RingConfig::default())
    }
}
