//! Per-guest worker, opcode dispatcher, and start/stop lifecycle for the
//! xenstore directory service (§4.E, §4.F, §4.G), plus the ambient
//! configuration and hypervisor-collaborator seams a complete server needs
//! (§10).

mod config;
mod dispatch;
mod error;
mod guest;
mod hypervisor;
mod lifecycle;
mod shutdown;
mod worker;

pub use config::ServerConfig;
pub use dispatch::{dispatch, DispatchOutcome};
pub use error::LifecycleError;
pub use guest::GuestContext;
pub use hypervisor::{Hypervisor, HypervisorError, MappedRegion, Port, SimulatedHypervisor, HVM_PARAM_STORE_EVTCHN};
pub use lifecycle::Server;
pub use shutdown::GuestShutdown;
pub use worker::run_worker;
