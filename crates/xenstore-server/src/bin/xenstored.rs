//! Demo entry point: starts a fixed set of simulated guests against an
//! in-memory hypervisor collaborator, since a real Xen hypervisor binding
//! is only available from inside the guest kernel this server ships on
//! (§10 "CLI / binary entry point").

use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use xenstore_server::{LifecycleError, Server, ServerConfig, SimulatedHypervisor};

#[derive(Parser, Debug)]
#[command(name = "xenstored", about = "Xenstore directory-service demo server")]
struct Cli {
    /// Overrides `XENSTORE_MAX_DOMAINS`.
    #[arg(long)]
    max_domains: Option<u32>,

    /// Overrides `XENSTORE_RING_SIZE`; must be a power of two.
    #[arg(long)]
    ring_size: Option<u32>,

    /// Comma-separated domids to start as simulated guests.
    #[arg(long, value_delimiter = ',')]
    domains: Vec<u32>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env();
    if let Some(max_domains) = cli.max_domains {
        config = config.with_max_domains(max_domains);
    }
    if let Some(ring_size) = cli.ring_size {
        config = config.with_ring_size(ring_size);
    }

    let server = Server::new(config, Arc::new(SimulatedHypervisor::new()));

    for domid in &cli.domains {
        server.start(*domid, 1, 0, 0)?;
        tracing::info!(domid, "simulated guest started");
    }

    tracing::info!(count = cli.domains.len(), "all simulated guests running, waiting for ctrl-c");
    let _ = tokio::signal::ctrl_c().await;

    for domid in &cli.domains {
        server.stop(*domid).await?;
    }

    Ok(())
}
