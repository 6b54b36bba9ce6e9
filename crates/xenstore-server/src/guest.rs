//! Per-guest connection state (§3 "Guest context").

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use xenstore_ring::DomainInterface;

use crate::shutdown::GuestShutdown;

/// Everything one connected guest's worker needs: its ring pair, its wake
/// signal, its transaction bookkeeping, and its local event-channel port.
pub struct GuestContext {
    pub domid: u32,
    pub iface: Arc<DomainInterface>,
    pub wake: Arc<Notify>,
    pub shutdown: GuestShutdown,
    pub local_port: u32,
    next_tx_id: AtomicU32,
    current_tx: AtomicU32,
    pending_stop_tx: Mutex<Option<u32>>,
}

impl GuestContext {
    /// `wake` is shared with the hypervisor collaborator's event-channel
    /// callback (§4.G), so a peer signalling the bound port and the
    /// worker's own safety-net poll both funnel through the same `Notify`.
    #[must_use]
    pub fn new(domid: u32, iface: Arc<DomainInterface>, wake: Arc<Notify>, local_port: u32) -> Self {
        Self {
            domid,
            iface,
            shutdown: GuestShutdown::new(Arc::clone(&wake)),
            wake,
            local_port,
            next_tx_id: AtomicU32::new(1),
            current_tx: AtomicU32::new(0),
            pending_stop_tx: Mutex::new(None),
        }
    }

    /// Allocates the next transaction id if none is running.
    ///
    /// # Errors
    ///
    /// Returns `()` (translated to `EBUSY` by the dispatcher) if a
    /// transaction is already active.
    pub fn start_transaction(&self) -> Result<u32, ()> {
        if self.current_tx.load(Ordering::Acquire) != 0 {
            return Err(());
        }
        let id = self.next_tx_id.fetch_add(1, Ordering::AcqRel);
        self.current_tx.store(id, Ordering::Release);
        Ok(id)
    }

    /// Defers the `TRANSACTION_END` acknowledgment: clears the running
    /// transaction and records the ending request's `req_id` so the worker
    /// emits the ack frame once its reply queue has drained (§4.E step 1).
    pub fn defer_transaction_end(&self, req_id: u32) {
        self.current_tx.store(0, Ordering::Release);
        *self.pending_stop_tx.lock().unwrap() = Some(req_id);
    }

    /// Takes the deferred `TRANSACTION_END` ack's `req_id`, if one is pending.
    pub fn take_pending_transaction_end(&self) -> Option<u32> {
        self.pending_stop_tx.lock().unwrap().take()
    }

    #[must_use]
    pub fn current_transaction(&self) -> u32 {
        self.current_tx.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xenstore_ring::RingConfig;

    fn ctx() -> GuestContext {
        GuestContext::new(3, Arc::new(DomainInterface::new(RingConfig::default())), Arc::new(Notify::new()), 7)
    }

    #[test]
    fn second_transaction_start_is_rejected_while_one_is_running() {
        let ctx = ctx();
        assert_eq!(ctx.start_transaction(), Ok(1));
        assert_eq!(ctx.start_transaction(), Err(()));
    }

    #[test]
    fn transaction_end_defers_and_clears_current() {
        let ctx = ctx();
        let id = ctx.start_transaction().unwrap();
        ctx.defer_transaction_end(id);
        assert_eq!(ctx.current_transaction(), 0);
        assert_eq!(ctx.take_pending_transaction_end(), Some(id));
        assert_eq!(ctx.take_pending_transaction_end(), None);
    }

    #[test]
    fn a_new_transaction_may_start_once_the_previous_one_ends() {
        let ctx = ctx();
        let id = ctx.start_transaction().unwrap();
        ctx.defer_transaction_end(id);
        assert_eq!(ctx.start_transaction(), Ok(2));
    }
}
