//! Graceful per-guest worker shutdown (§4.E "Cancellation").
//!
//! Follows the same shape as a oneshot-backed stream shutdown: a shared flag
//! plus a `Notify` the worker already polls for wake-ups, so stopping a
//! worker is just "set the flag, then wake it as if data had arrived".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug)]
struct ShutdownState {
    stop_requested: AtomicBool,
}

/// Shared between a guest's [`crate::guest::GuestContext`] and whatever
/// holds the corresponding [`GuestShutdown`] handle (lifecycle's registry).
#[derive(Clone)]
pub struct GuestShutdown {
    state: Arc<ShutdownState>,
    wake: Arc<Notify>,
}

impl GuestShutdown {
    #[must_use]
    pub fn new(wake: Arc<Notify>) -> Self {
        Self { state: Arc::new(ShutdownState { stop_requested: AtomicBool::new(false) }), wake }
    }

    /// Requests that the worker stop after its current dispatch. Idempotent:
    /// calling this more than once has no additional effect.
    pub fn request_stop(&self) {
        self.state.stop_requested.store(true, Ordering::Release);
        self.wake.notify_waiters();
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.state.stop_requested.load(Ordering::Acquire)
    }
}
