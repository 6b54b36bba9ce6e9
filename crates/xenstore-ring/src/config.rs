/// Configuration for a guest ring pair.
///
/// Mirrors the Xen wire protocol's fixed ring size: both the request and the
/// response rings embedded in a `xenstore_domain_interface` share one capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Ring capacity in bytes. Must be a power of two.
    capacity: u32,
}

impl RingConfig {
    /// `XENSTORE_RING_SIZE` as defined by the Xen public ABI.
    pub const XENSTORE_RING_SIZE: u32 = 1024;

    /// Creates a configuration with a custom capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        assert!(capacity > 0 && capacity.is_power_of_two(), "ring capacity must be a power of two");
        Self { capacity }
    }

    /// Returns the ring capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the index mask used to compute a physical slot from a free-running index.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> u32 {
        self.capacity - 1
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::new(Self::XENSTORE_RING_SIZE)
    }
}
