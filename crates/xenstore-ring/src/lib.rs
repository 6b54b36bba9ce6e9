//! Byte-oriented ring codec for the xenstore shared-memory wire protocol.
//!
//! This crate implements §4.A of the directory-service spec in isolation
//! from framing and dispatch: producer/consumer index arithmetic, wrap-aware
//! contiguous copies, and untrusted-peer corruption recovery. Frame parsing
//! lives in `xenstore-wire`; nothing in here interprets ring contents.

mod config;
mod error;
mod interface;
mod ring;

pub use config::RingConfig;
pub use error::RingError;
pub use interface::{DomainInterface, CONNECTED, SERVER_FEATURE_RECONNECTION};
pub use ring::ByteRing;
