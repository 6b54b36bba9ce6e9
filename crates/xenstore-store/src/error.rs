use thiserror::Error;

/// Errors the store and watch registry can produce, translated to wire
/// errno names at the dispatcher boundary (§4.F "Error translation").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A segment of the requested path does not exist.
    #[error("node not found")]
    NotFound,

    /// The operation is not valid for the addressed node (e.g. removing the root).
    #[error("invalid operation")]
    Invalid,

    /// The path or payload exceeds a configured size bound.
    #[error("out of memory")]
    OutOfMemory,
}

impl StoreError {
    /// The wire errno this error translates to (§4.F, §7).
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => xenstore_wire::ENOENT,
            Self::Invalid => xenstore_wire::EINVAL,
            Self::OutOfMemory => xenstore_wire::ENOMEM,
        }
    }
}
