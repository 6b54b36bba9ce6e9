//! Starting and stopping a guest's worker (§4.G).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use xenstore_ring::DomainInterface;
use xenstore_store::DirectoryService;

use crate::config::ServerConfig;
use crate::error::LifecycleError;
use crate::guest::GuestContext;
use crate::hypervisor::{Hypervisor, MappedRegion, HVM_PARAM_STORE_EVTCHN};
use crate::worker::run_worker;

struct RunningGuest {
    ctx: Arc<GuestContext>,
    region: MappedRegion,
    join: JoinHandle<()>,
}

/// Owns the worker-stack slot bitmap and every currently running guest
/// worker. One instance per server process; `start`/`stop` are the only
/// entry points lifecycle exposes (§4.G).
pub struct Server {
    config: ServerConfig,
    svc: Arc<DirectoryService>,
    hv: Arc<dyn Hypervisor>,
    slots: Mutex<Vec<bool>>,
    guests: Mutex<HashMap<u32, RunningGuest>>,
}

impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, hv: Arc<dyn Hypervisor>) -> Self {
        Self {
            slots: Mutex::new(vec![false; config.max_domains as usize]),
            config,
            svc: Arc::new(DirectoryService::new()),
            hv,
            guests: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn directory_service(&self) -> &Arc<DirectoryService> {
        &self.svc
    }

    /// Returns the running guest's ring pair, for a simulated peer to write
    /// requests into and read replies back out of.
    #[must_use]
    pub fn interface(&self, domid: u32) -> Option<Arc<DomainInterface>> {
        self.guests.lock().unwrap().get(&domid).map(|g| Arc::clone(&g.ctx.iface))
    }

    /// Returns the running guest's local event-channel port, so a simulated
    /// peer can call [`Hypervisor::notify_evtchn`] after writing a request.
    #[must_use]
    pub fn local_port(&self, domid: u32) -> Option<u32> {
        self.guests.lock().unwrap().get(&domid).map(|g| g.ctx.local_port)
    }

    /// Maps `domid`'s ring page, binds its event channel, and spawns its
    /// worker task. Any step failing after the slot was allocated unwinds
    /// the steps taken so far, in reverse order.
    ///
    /// # Errors
    ///
    /// See [`LifecycleError`].
    pub fn start(&self, domid: u32, n_pages: u32, gpfn: u64, remote_port: u32) -> Result<(), LifecycleError> {
        if domid >= self.config.max_domains {
            return Err(LifecycleError::DomainOutOfRange { domid, max_domains: self.config.max_domains });
        }

        self.allocate_slot(domid)?;

        let region = match self.hv.map_region(domid, n_pages, gpfn) {
            Ok(r) => r,
            Err(e) => {
                self.release_slot(domid);
                return Err(e.into());
            }
        };

        let iface = Arc::new(DomainInterface::new(self.config.ring_config()));
        iface.mark_connected();

        let wake = Arc::new(Notify::new());
        let local_port = match self.hv.bind_interdomain_event_channel(domid, remote_port, Arc::clone(&wake)) {
            Ok(p) => p,
            Err(e) => {
                self.hv.unmap_region(domid, region);
                self.release_slot(domid);
                return Err(e.into());
            }
        };

        if let Err(e) = self.hv.hvm_set_parameter(domid, HVM_PARAM_STORE_EVTCHN, u64::from(local_port)) {
            let _ = self.hv.unbind(domid, local_port);
            self.hv.unmap_region(domid, region);
            self.release_slot(domid);
            return Err(e.into());
        }

        let ctx = Arc::new(GuestContext::new(domid, iface, wake, local_port));
        let join = tokio::spawn(run_worker(
            Arc::clone(&ctx),
            Arc::clone(&self.svc),
            Arc::clone(&self.hv),
            self.config.worker_poll_interval,
        ));

        tracing::info!(domid, local_port, "guest worker started");
        self.guests.lock().unwrap().insert(domid, RunningGuest { ctx, region, join });
        Ok(())
    }

    /// Signals the worker to stop, waits for it to join, then releases the
    /// event channel, ring mapping, and worker-stack slot.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::UnknownGuest`] if `domid` has no running worker.
    pub async fn stop(&self, domid: u32) -> Result<(), LifecycleError> {
        let running = self.guests.lock().unwrap().remove(&domid).ok_or(LifecycleError::UnknownGuest(domid))?;

        running.ctx.shutdown.request_stop();
        if let Err(err) = running.join.await {
            tracing::error!(domid, %err, "guest worker task panicked during shutdown");
        }

        let mut last_err = None;
        if let Err(e) = self.hv.unbind(domid, running.ctx.local_port) {
            tracing::error!(domid, %e, "failed to unbind event channel");
            last_err = Some(e);
        }
        if let Err(e) = self.hv.close(domid, running.ctx.local_port) {
            tracing::error!(domid, %e, "failed to close event channel");
            last_err = Some(e);
        }
        self.hv.unmap_region(domid, running.region);
        self.release_slot(domid);

        tracing::info!(domid, "guest worker stopped");
        last_err.map_or(Ok(()), |e| Err(e.into()))
    }

    fn allocate_slot(&self, domid: u32) -> Result<(), LifecycleError> {
        let mut slots = self.slots.lock().unwrap();
        if slots[domid as usize] {
            return Err(LifecycleError::NoFreeSlot);
        }
        slots[domid as usize] = true;
        Ok(())
    }

    fn release_slot(&self, domid: u32) {
        self.slots.lock().unwrap()[domid as usize] = false;
    }
}
