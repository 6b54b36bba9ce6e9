//! Server-level error types (§7, §10 ambient stack).

use thiserror::Error;

use crate::hypervisor::HypervisorError;

/// Errors from starting or stopping a guest's worker (§4.G). Composes the
/// hypervisor collaborator's errors via `#[from]`, the same shape the
/// teacher uses to wrap a lower-layer channel error into its stream-facing
/// error type.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("domid {domid} exceeds the configured max_domains ({max_domains})")]
    DomainOutOfRange { domid: u32, max_domains: u32 },

    #[error("no free worker-stack slot available")]
    NoFreeSlot,

    #[error("domid {0} has no running worker")]
    UnknownGuest(u32),

    #[error("hypervisor collaborator failed: {0}")]
    Hypervisor(#[from] HypervisorError),
}
