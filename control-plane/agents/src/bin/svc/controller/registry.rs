//! The registry is the driver's long-lived state: the CLI client(s), the
//! configuration, the cached cluster topology, and the pending vdisk-copy
//! operations together with their persisted metadata mirror.

use super::reconciler::ReconcilerControl;
use super::task_poller::{PollEvent, PollTriggerEvent};
use crate::cli::client::CliClient;
use agents::errors::SvcError;
use once_cell::sync::OnceCell;
use std::{collections::HashMap, sync::Arc, time::Duration};
use stor_port::types::v0::{
    store::{definitions::AdminMetadataStore, volume::{VdiskCopyOp, VdiskCopyOps}},
    transport::{ClusterInfo, IoGroup, Node, Pool, PoolId, ReplicationMode, VdiskName, Volume, VolumeId},
};
use utils::VDISKCOPYOPS_METADATA_KEY;

/// Configuration of the replication target backend.
#[derive(Debug, Clone)]
pub(crate) struct ReplicationTargetConfig {
    /// The backend id callers use to address the target on failover.
    pub(crate) backend_id: String,
    /// Name of the target cluster, as seen in partnership listings.
    pub(crate) cluster_name: String,
    /// Pool on the target cluster to carve target vdisks from.
    pub(crate) pool: PoolId,
    /// Replication flavour served by this backend pair.
    pub(crate) mode: ReplicationMode,
    /// Partnership background bandwidth, in Mbps.
    pub(crate) bandwidth_mbps: u32,
    /// Management address of the target cluster when the partnership is
    /// established over IP rather than Fibre Channel.
    pub(crate) remote_ip: Option<String>,
}

/// Static configuration of the driver backend.
#[derive(Debug, Clone)]
pub(crate) struct SvcConfig {
    /// The pool vdisks are carved from by default.
    pub(crate) pool: PoolId,
    /// The period at which the topology cache is refreshed.
    pub(crate) cache_period: Duration,
    /// The period at which pending copy operations are reconciled.
    pub(crate) reconcile_period: Duration,
    /// The period at which FlashCopy state is polled.
    pub(crate) fc_poll_period: Duration,
    /// Bound on the FlashCopy prepare phase.
    pub(crate) fc_prepare_timeout: Duration,
    /// Background copy rate for clone mappings.
    pub(crate) fc_copy_rate: u32,
    /// The replication target, when replication is deployed.
    pub(crate) replication_target: Option<ReplicationTargetConfig>,
}

/// Cached view of the cluster topology, refreshed periodically and at
/// setup. Callers must not assume it is unchanged across an await point.
#[derive(Debug, Default, Clone)]
pub(crate) struct ClusterState {
    /// The node canisters.
    pub(crate) nodes: Vec<Node>,
    /// The I/O groups.
    pub(crate) io_groups: Vec<IoGroup>,
    /// The pools, keyed by name.
    pub(crate) pools: HashMap<PoolId, Pool>,
}

/// Core registry, shared by the service operations and the reconcilers.
#[derive(Clone)]
pub(crate) struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    client: CliClient,
    target_client: Option<CliClient>,
    store: Arc<dyn AdminMetadataStore>,
    config: SvcConfig,
    cluster: OnceCell<ClusterInfo>,
    state: parking_lot::Mutex<ClusterState>,
    /// Pending copy operations and their persisted mirror are only ever
    /// mutated while this lock is held, so the two cannot diverge.
    copy_ops: tokio::sync::Mutex<HashMap<VolumeId, (VdiskName, VdiskCopyOps)>>,
    reconciler: ReconcilerControl,
}

impl Registry {
    /// Create a new `Self` from the given client(s), store and config.
    pub(crate) fn new(
        client: CliClient,
        target_client: Option<CliClient>,
        store: Arc<dyn AdminMetadataStore>,
        config: SvcConfig,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                client,
                target_client,
                store,
                config,
                cluster: OnceCell::new(),
                state: parking_lot::Mutex::new(ClusterState::default()),
                copy_ops: tokio::sync::Mutex::new(HashMap::new()),
                reconciler: ReconcilerControl::new(),
            }),
        }
    }

    /// The CLI client of the local cluster.
    pub(crate) fn client(&self) -> &CliClient {
        &self.inner.client
    }

    /// The CLI client of the replication target cluster, when configured.
    pub(crate) fn target_client(&self) -> Option<&CliClient> {
        self.inner.target_client.as_ref()
    }

    /// The driver configuration.
    pub(crate) fn config(&self) -> &SvcConfig {
        &self.inner.config
    }

    /// The reconciler control.
    pub(crate) fn reconciler(&self) -> &ReconcilerControl {
        &self.inner.reconciler
    }

    /// Probe the cluster identity and capabilities once, at setup.
    pub(crate) async fn load_cluster_info(&self) -> Result<(), SvcError> {
        let mut info = self.client().lssystem().await?;
        info.compression_enabled = self.client().lslicense_compression().await?;
        self.inner.cluster.set(info).ok();
        Ok(())
    }

    /// The cluster identity, probed at setup.
    pub(crate) fn cluster(&self) -> Result<&ClusterInfo, SvcError> {
        self.inner.cluster.get().ok_or_else(|| SvcError::Internal {
            details: "The cluster information has not been loaded yet".to_string(),
        })
    }

    /// Whether the compression license is active on the local cluster.
    pub(crate) fn compression_enabled(&self) -> bool {
        self.inner
            .cluster
            .get()
            .map(|info| info.compression_enabled)
            .unwrap_or(false)
    }

    /// Refresh the cached topology from the array.
    pub(crate) async fn refresh_state(&self) -> Result<(), SvcError> {
        let nodes = self.client().lsnode().await?;
        let io_groups = self.client().lsiogrp().await?;
        let pools = self.client().lsmdiskgrp().await?;
        let mut state = self.inner.state.lock();
        state.nodes = nodes;
        state.io_groups = io_groups;
        state.pools = pools.into_iter().map(|pool| (pool.name.clone(), pool)).collect();
        Ok(())
    }

    /// A snapshot of the cached topology.
    pub(crate) fn state(&self) -> ClusterState {
        self.inner.state.lock().clone()
    }

    /// The cached pool by name.
    pub(crate) fn pool(&self, pool: &PoolId) -> Result<Pool, SvcError> {
        self.inner
            .state
            .lock()
            .pools
            .get(pool)
            .cloned()
            .ok_or_else(|| SvcError::PoolNotFound { pool: pool.clone() })
    }

    /// Whether an I/O group with the given id exists.
    pub(crate) fn io_group_exists(&self, iogrp: u32) -> bool {
        self.inner
            .state
            .lock()
            .io_groups
            .iter()
            .any(|group| group.id == iogrp && group.node_count > 0)
    }

    // ===== pending vdisk-copy operations =====

    /// Track a new copy operation, mirroring it to the volume's admin
    /// metadata before the lock is released, and nudge the reconciler.
    pub(crate) async fn register_copy_op(
        &self,
        volume: &VolumeId,
        name: &VdiskName,
        op: VdiskCopyOp,
    ) -> Result<(), SvcError> {
        {
            let mut all = self.inner.copy_ops.lock().await;
            let (_, ops) = all
                .entry(volume.clone())
                .or_insert_with(|| (name.clone(), VdiskCopyOps::new()));
            ops.push(op.clone());
            let encoded = ops.to_string();
            if let Err(error) = self
                .inner
                .store
                .put(volume, VDISKCOPYOPS_METADATA_KEY, &encoded)
                .await
            {
                // keep the mirror authoritative: back out the in-memory add
                if let Some((_, ops)) = all.get_mut(volume) {
                    ops.remove(&op);
                }
                return Err(error.into());
            }
        }
        self.inner
            .reconciler
            .notify(PollEvent::Triggered(PollTriggerEvent::VdiskCopyRegistered))
            .await;
        Ok(())
    }

    /// Untrack a finished (or abandoned) copy operation, updating the
    /// persisted mirror under the same lock.
    pub(crate) async fn remove_copy_op(
        &self,
        volume: &VolumeId,
        op: &VdiskCopyOp,
    ) -> Result<(), SvcError> {
        let mut all = self.inner.copy_ops.lock().await;
        let Some((_, ops)) = all.get_mut(volume) else {
            return Ok(());
        };
        ops.remove(op);
        if ops.is_empty() {
            all.remove(volume);
            self.inner
                .store
                .delete(volume, VDISKCOPYOPS_METADATA_KEY)
                .await?;
        } else {
            let encoded = ops.to_string();
            self.inner
                .store
                .put(volume, VDISKCOPYOPS_METADATA_KEY, &encoded)
                .await?;
        }
        Ok(())
    }

    /// A snapshot of all tracked copy operations.
    pub(crate) async fn copy_ops(&self) -> HashMap<VolumeId, (VdiskName, VdiskCopyOps)> {
        self.inner.copy_ops.lock().await.clone()
    }

    /// Whether any copy operation is tracked.
    pub(crate) async fn has_copy_ops(&self) -> bool {
        !self.inner.copy_ops.lock().await.is_empty()
    }

    /// Re-learn pending copy operations from the persisted metadata of the
    /// given volumes, after a driver restart.
    pub(crate) async fn restore_copy_ops(&self, volumes: &[Volume]) -> Result<(), SvcError> {
        let mut restored = 0;
        {
            let mut all = self.inner.copy_ops.lock().await;
            for volume in volumes {
                let Some(encoded) = self
                    .inner
                    .store
                    .get(&volume.uuid, VDISKCOPYOPS_METADATA_KEY)
                    .await?
                else {
                    continue;
                };
                let ops = encoded
                    .parse::<VdiskCopyOps>()
                    .map_err(|reason| SvcError::Internal {
                        details: format!(
                            "Corrupt {VDISKCOPYOPS_METADATA_KEY} metadata of volume '{}': {reason}",
                            volume.uuid
                        ),
                    })?;
                if !ops.is_empty() {
                    restored += ops.len();
                    all.insert(volume.uuid.clone(), (volume.name.clone(), ops));
                }
            }
        }
        if restored > 0 {
            tracing::info!(count = restored, "Restored pending vdisk-copy operations");
            self.inner
                .reconciler
                .notify(PollEvent::Triggered(PollTriggerEvent::VdiskCopyRegistered))
                .await;
        }
        Ok(())
    }
}
