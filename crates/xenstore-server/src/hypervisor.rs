//! The hypervisor-provided primitives this server treats as an opaque
//! external collaborator (§6): mapping a guest's ring page, binding the
//! interdomain event channel, and publishing the local port via an HVM
//! parameter. Modeled as a trait so lifecycle and worker code can run
//! against [`SimulatedHypervisor`] in tests and the demo CLI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Notify;

/// `HVM_PARAM_STORE_EVTCHN`, the HVM parameter the store's local event port
/// is published through so the guest's kernel can bind to it.
pub const HVM_PARAM_STORE_EVTCHN: u32 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HypervisorError {
    #[error("domain {0} is unknown to this hypervisor collaborator")]
    UnknownDomain(u32),
    #[error("event channel port {0} is not bound")]
    PortNotBound(u32),
}

/// Opaque handle to a mapped ring page, released by [`Hypervisor::unmap_region`].
pub type MappedRegion = Arc<()>;

/// Local event-channel port number, handed back by `bind_interdomain_event_channel`.
pub type Port = u32;

/// The hypervisor collaborator interface (§6 "Hypervisor collaborator
/// interface"). A real implementation wraps Xen hypercalls; this crate only
/// ships [`SimulatedHypervisor`] for local testing and the demo CLI.
pub trait Hypervisor: Send + Sync {
    /// Maps the guest's ring page into server address space.
    fn map_region(&self, domid: u32, n_pages: u32, gpfn: u64) -> Result<MappedRegion, HypervisorError>;

    /// Unmaps a region previously returned by `map_region`.
    fn unmap_region(&self, domid: u32, region: MappedRegion);

    /// Binds an interdomain event channel to the guest's pre-shared remote
    /// port, returning the local port the server will signal on. `wake` is
    /// the callback installed for this port (§4.G "installing the callback
    /// that signals the semaphore"); a real implementation would register
    /// an interrupt handler instead of holding a `Notify` directly.
    fn bind_interdomain_event_channel(&self, domid: u32, remote_port: Port, wake: Arc<Notify>) -> Result<Port, HypervisorError>;

    /// Unbinds a previously bound port.
    fn unbind(&self, domid: u32, local_port: Port) -> Result<(), HypervisorError>;

    /// Closes a port outright (used during teardown after unbind).
    fn close(&self, domid: u32, local_port: Port) -> Result<(), HypervisorError>;

    /// Signals the guest's end of the event channel, waking its kernel to
    /// re-check the ring.
    fn notify_evtchn(&self, domid: u32, local_port: Port) -> Result<(), HypervisorError>;

    /// Publishes `value` under `param` for `domid` (only
    /// `HVM_PARAM_STORE_EVTCHN` is used here).
    fn hvm_set_parameter(&self, domid: u32, param: u32, value: u64) -> Result<(), HypervisorError>;
}

/// An in-memory stand-in for the real hypervisor, used by tests and the
/// `--domains` demo CLI: `map_region` always succeeds, event channels are
/// simulated with a [`tokio::sync::Notify`] per bound port rather than a
/// real interdomain signal, and `notify_evtchn` wakes that `Notify`.
#[derive(Default)]
pub struct SimulatedHypervisor {
    next_port: AtomicU32,
    ports: Mutex<HashMap<Port, Arc<Notify>>>,
    params: Mutex<HashMap<(u32, u32), u64>>,
}

impl SimulatedHypervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `Notify` a simulated guest can wait on to observe
    /// `notify_evtchn` calls for `local_port`.
    #[must_use]
    pub fn port_notify(&self, local_port: Port) -> Option<Arc<Notify>> {
        self.ports.lock().unwrap().get(&local_port).cloned()
    }
}

impl Hypervisor for SimulatedHypervisor {
    fn map_region(&self, _domid: u32, _n_pages: u32, _gpfn: u64) -> Result<MappedRegion, HypervisorError> {
        Ok(Arc::new(()))
    }

    fn unmap_region(&self, _domid: u32, _region: MappedRegion) {}

    fn bind_interdomain_event_channel(&self, _domid: u32, _remote_port: Port, wake: Arc<Notify>) -> Result<Port, HypervisorError> {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        self.ports.lock().unwrap().insert(port, wake);
        Ok(port)
    }

    fn unbind(&self, _domid: u32, local_port: Port) -> Result<(), HypervisorError> {
        self.ports
            .lock()
            .unwrap()
            .remove(&local_port)
            .map(|_| ())
            .ok_or(HypervisorError::PortNotBound(local_port))
    }

    fn close(&self, _domid: u32, _local_port: Port) -> Result<(), HypervisorError> {
        Ok(())
    }

    fn notify_evtchn(&self, _domid: u32, local_port: Port) -> Result<(), HypervisorError> {
        let ports = self.ports.lock().unwrap();
        let notify = ports.get(&local_port).ok_or(HypervisorError::PortNotBound(local_port))?;
        notify.notify_waiters();
        Ok(())
    }

    fn hvm_set_parameter(&self, domid: u32, param: u32, value: u64) -> Result<(), HypervisorError> {
        self.params.lock().unwrap().insert((domid, param), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_unbind_roundtrips() {
        let hv = SimulatedHypervisor::new();
        let port = hv.bind_interdomain_event_channel(3, 0, Arc::new(Notify::new())).unwrap();
        assert!(hv.port_notify(port).is_some());
        hv.unbind(3, port).unwrap();
        assert!(hv.port_notify(port).is_none());
    }

    #[test]
    fn unbind_unknown_port_is_an_error() {
        let hv = SimulatedHypervisor::new();
        assert_eq!(hv.unbind(3, 999), Err(HypervisorError::PortNotBound(999)));
    }

    #[tokio::test]
    async fn notify_evtchn_wakes_the_registered_callback() {
        let hv = SimulatedHypervisor::new();
        let wake = Arc::new(Notify::new());
        let port = hv.bind_interdomain_event_channel(3, 0, Arc::clone(&wake)).unwrap();
        let waiter = tokio::spawn(async move { wake.notified().await });
        // Give the spawned task a chance to register as a waiter before notifying.
        tokio::task::yield_now().await;
        hv.notify_evtchn(3, port).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }
}
