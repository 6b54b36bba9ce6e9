use thiserror::Error;

/// Errors surfaced by the ring codec.
///
/// `Corrupted` is not fatal: the caller resets the offending indices and
/// continues (§5, "Shared memory with untrusted peer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The peer advanced its producer index further than the ring can hold.
    #[error("ring indices corrupted: prod={prod} cons={cons} capacity={capacity}")]
    Corrupted { prod: u32, cons: u32, capacity: u32 },

    /// A frame header declared a body longer than the ring's total capacity.
    #[error("frame length {len} exceeds ring capacity {capacity}")]
    FrameTooLarge { len: u32, capacity: u32 },
}
