//! The SVC storage driver agent: a control plane for Storwize/SVC-family
//! arrays reached over their administrative SSH CLI.

/// The CLI transport, parser and typed command client.
pub(crate) mod cli;
/// The registry and the background reconciliation loops.
pub(crate) mod controller;
/// FlashCopy orchestration and its state machine.
pub(crate) mod flashcopy;
/// Consistency group operations.
pub(crate) mod group;
/// Host mapping operations.
pub(crate) mod host;
/// The remote-mirror replication strategies.
pub(crate) mod replication;
/// The driver service surface.
pub(crate) mod service;
/// The volume lifecycle operations.
pub(crate) mod volume;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::{client::CliClient, session::SshPool};
use controller::registry::{Registry, ReplicationTargetConfig, SvcConfig};
use service::Service;
use std::sync::Arc;
use stor_port::types::v0::{
    store::definitions::InMemoryStore,
    transport::{ManagementEndpoint, PoolId, ReplicationMode, SshCredentials},
};

/// The Cli arguments for this binary.
#[derive(Debug, Parser)]
pub(crate) struct CliArgs {
    /// The primary management address of the array.
    #[clap(long, short)]
    management_address: String,

    /// The secondary management address, toggled to when the primary
    /// becomes unreachable.
    #[clap(long)]
    secondary_address: Option<String>,

    /// The TCP port of the array CLI.
    #[clap(long, default_value_t = utils::DEFAULT_CLI_PORT)]
    port: u16,

    /// The CLI user.
    #[clap(long, default_value = "superuser")]
    username: String,

    /// The CLI password.
    #[clap(long, env = "SVC_PASSWORD")]
    password: Option<String>,

    /// Path to the private key used for CLI authentication.
    #[clap(long)]
    key_file: Option<String>,

    /// The timeout for establishing one CLI session.
    #[clap(long, default_value = utils::DEFAULT_CONN_TIMEOUT)]
    connect_timeout: humantime::Duration,

    /// Number of warm CLI sessions kept in the pool.
    #[clap(long, default_value_t = utils::DEFAULT_SSH_POOL_MIN)]
    pool_min_size: usize,

    /// Bound on concurrent CLI sessions.
    #[clap(long, default_value_t = utils::DEFAULT_SSH_POOL_MAX)]
    pool_max_size: usize,

    /// The pool to carve vdisks from.
    #[clap(long)]
    pool: String,

    /// The period at which the registry refreshes its cache of the
    /// cluster topology.
    #[clap(long, short, default_value = utils::CACHE_POLL_PERIOD)]
    cache_period: humantime::Duration,

    /// The period at which pending vdisk-copy operations are checked for
    /// synchronisation.
    #[clap(long, default_value = utils::COPYOPS_RECONCILE_PERIOD)]
    copyops_reconcile_period: humantime::Duration,

    /// The period at which FlashCopy state is polled.
    #[clap(long, default_value = utils::FLASHCOPY_POLL_PERIOD)]
    flashcopy_poll_period: humantime::Duration,

    /// Bound on the FlashCopy prepare phase.
    #[clap(long, default_value = utils::FLASHCOPY_PREPARE_TIMEOUT)]
    flashcopy_prepare_timeout: humantime::Duration,

    /// Background copy rate for clone mappings, 1-150.
    #[clap(long, default_value_t = utils::DEFAULT_FLASHCOPY_RATE)]
    flashcopy_rate: u32,

    /// The backend id of the replication target.
    #[clap(long)]
    replication_backend_id: Option<String>,

    /// Name of the replication target cluster.
    #[clap(long)]
    replication_cluster: Option<String>,

    /// The management address of the replication target cluster.
    #[clap(long)]
    replication_address: Option<String>,

    /// The pool on the replication target to carve auxiliary vdisks from.
    #[clap(long)]
    replication_pool: Option<String>,

    /// The replication flavour: global or metro.
    #[clap(long, default_value = "global")]
    replication_mode: String,

    /// Partnership background bandwidth in Mbps.
    #[clap(long, default_value_t = 1000)]
    replication_bandwidth: u32,

    /// Tracing output style.
    #[clap(long, default_value = "compact")]
    fmt_style: String,
}

impl CliArgs {
    fn args() -> Self {
        CliArgs::parse()
    }

    fn credentials(&self) -> SshCredentials {
        SshCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
            key_path: self.key_file.clone(),
        }
    }

    fn endpoint(&self, address: &str, secondary: Option<String>) -> ManagementEndpoint {
        ManagementEndpoint {
            primary_address: address.to_string(),
            secondary_address: secondary,
            port: self.port,
            credentials: self.credentials(),
            connect_timeout: self.connect_timeout.into(),
            pool_min_size: self.pool_min_size,
            pool_max_size: self.pool_max_size,
        }
    }

    fn config(&self) -> anyhow::Result<SvcConfig> {
        let replication_target = match &self.replication_backend_id {
            Some(backend_id) => {
                let (cluster_name, pool) = self
                    .replication_cluster
                    .clone()
                    .zip(self.replication_pool.clone())
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "--replication-cluster and --replication-pool are required with \
                             --replication-backend-id"
                        )
                    })?;
                Some(ReplicationTargetConfig {
                    backend_id: backend_id.clone(),
                    cluster_name,
                    pool: PoolId::from(pool),
                    mode: self
                        .replication_mode
                        .parse::<ReplicationMode>()
                        .map_err(|_| anyhow::anyhow!("invalid replication mode"))?,
                    bandwidth_mbps: self.replication_bandwidth,
                    remote_ip: self.replication_address.clone(),
                })
            }
            None => None,
        };
        Ok(SvcConfig {
            pool: PoolId::from(self.pool.as_str()),
            cache_period: self.cache_period.into(),
            reconcile_period: self.copyops_reconcile_period.into(),
            fc_poll_period: self.flashcopy_poll_period.into(),
            fc_prepare_timeout: self.flashcopy_prepare_timeout.into(),
            fc_copy_rate: self.flashcopy_rate,
            replication_target,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::args();
    utils::tracing_telemetry::init_tracing(
        args.fmt_style
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid tracing style"))?,
    );
    tracing::info!(?args, "Starting the SVC driver agent");

    let config = args.config()?;
    let endpoint = args.endpoint(&args.management_address, args.secondary_address.clone());
    let pool = SshPool::new(endpoint).await?;
    let client = CliClient::new(pool, utils::CLI_FIELD_DELIMITER);

    let target_client = match (&config.replication_target, &args.replication_address) {
        (Some(_), Some(address)) => {
            let endpoint = args.endpoint(address, None);
            let pool = SshPool::new(endpoint).await?;
            Some(CliClient::new(pool, utils::CLI_FIELD_DELIMITER))
        }
        _ => None,
    };

    let store = Arc::new(InMemoryStore::new());
    let registry = Registry::new(client, target_client, store, config);
    let service = Service::start(registry).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down the SVC driver agent");
    service.shutdown().await;
    Ok(())
}
