//! The driver service: the long-lived object exposing the volume
//! lifecycle contract to the volume-manager collaborator. Every mutating
//! call validates its preconditions, computes the backend options from the
//! volume type, calls into the helpers, and returns a typed model update -
//! raw CLI errors never escape.

use crate::controller::registry::Registry;
use crate::replication::{strategy_for, ReplicationStrategy};
use agents::errors::SvcError;
use stor_port::types::v0::transport::{FailoverHost, FailoverVolumeUpdate, Volume, VolumeUpdate};

/// The driver service.
pub(crate) struct Service {
    registry: Registry,
    replication: Option<Box<dyn ReplicationStrategy>>,
}

impl Service {
    /// Set the service up: probe the cluster identity and capabilities,
    /// prime the topology cache, validate the configured pool, establish
    /// the replication partnership when a target is configured, and start
    /// the reconcilers.
    pub(crate) async fn start(registry: Registry) -> Result<Self, SvcError> {
        registry.load_cluster_info().await?;
        registry.refresh_state().await?;
        registry.pool(&registry.config().pool)?;
        let cluster = registry.cluster()?.clone();
        tracing::info!(cluster.id=%cluster.id, cluster.name=%cluster.name,
            code_level=%cluster.code_level, "Connected to the backend cluster"
        );

        let replication = match registry.config().replication_target.clone() {
            Some(target) => {
                if registry.target_client().is_none() {
                    return Err(SvcError::ReplicationNotConfigured {});
                }
                let strategy = strategy_for(registry.clone(), target);
                strategy.establish_target_partnership().await?;
                Some(strategy)
            }
            None => None,
        };

        registry.reconciler().start(registry.clone()).await;
        Ok(Self {
            registry,
            replication,
        })
    }

    /// Get a reference to the registry.
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The replication strategy, when a target is configured.
    pub(crate) fn replication(&self) -> Result<&dyn ReplicationStrategy, SvcError> {
        self.replication
            .as_deref()
            .ok_or(SvcError::ReplicationNotConfigured {})
    }

    /// Whether replication is configured on this backend.
    pub(crate) fn replication_enabled(&self) -> bool {
        self.replication.is_some()
    }

    /// Re-learn pending vdisk-copy operations after a restart, from the
    /// volumes the manager knows about.
    pub(crate) async fn restore_copy_ops(&self, volumes: &[Volume]) -> Result<(), SvcError> {
        self.registry.restore_copy_ops(volumes).await
    }

    /// Stop the background reconcilers.
    pub(crate) async fn shutdown(&self) {
        self.registry.reconciler().shutdown().await;
    }

    /// Fail the backend over to the replication target. Volumes without a
    /// usable relationship are marked errored rather than failed over.
    pub(crate) async fn failover_host(
        &self,
        request: &FailoverHost,
    ) -> Result<Vec<FailoverVolumeUpdate>, SvcError> {
        let strategy = self.replication()?;
        let target = self
            .registry
            .config()
            .replication_target
            .as_ref()
            .ok_or(SvcError::ReplicationNotConfigured {})?;
        if request.secondary_backend_id.as_str() != target.backend_id {
            return Err(SvcError::ReplicationTargetMismatch {
                requested: request.secondary_backend_id.to_string(),
                configured: target.backend_id.clone(),
            });
        }
        let mut updates = vec![];
        for volume in &request.volumes {
            let update = strategy
                .failover_volume_host(request.secondary_backend_id.as_str(), volume)
                .await?;
            if let Some(update) = update {
                updates.push(FailoverVolumeUpdate {
                    uuid: volume.uuid.clone(),
                    update,
                });
            }
        }
        Ok(updates)
    }

    /// Fail the given volumes back to this backend. Every volume must be
    /// in a synchronized-family state before any volume is acted on;
    /// otherwise the whole batch is refused and nothing changes.
    pub(crate) async fn replication_failback(
        &self,
        volumes: &[Volume],
    ) -> Result<Vec<FailoverVolumeUpdate>, SvcError> {
        let strategy = self.replication()?;
        for volume in volumes {
            strategy.check_failback_ready(volume).await?;
        }
        let mut updates = vec![];
        for volume in volumes {
            let update = strategy.replication_failback(volume).await?;
            updates.push(FailoverVolumeUpdate {
                uuid: volume.uuid.clone(),
                update,
            });
        }
        Ok(updates)
    }

    /// Promote the replication target of one volume to primary, granting
    /// it write access. The single-volume flavour of a host failover.
    pub(crate) async fn promote_replica(
        &self,
        volume: &Volume,
    ) -> Result<Option<VolumeUpdate>, SvcError> {
        let strategy = self.replication()?;
        let target = self
            .registry
            .config()
            .replication_target
            .as_ref()
            .ok_or(SvcError::ReplicationNotConfigured {})?;
        strategy
            .failover_volume_host(&target.backend_id, volume)
            .await
    }

    /// The replication status of one volume, from its relationship state.
    pub(crate) async fn replication_status(
        &self,
        volume: &Volume,
    ) -> Result<Option<VolumeUpdate>, SvcError> {
        let strategy = self.replication()?;
        let state = strategy.get_relationship_status(&volume.name).await?;
        Ok(state.map(|state| VolumeUpdate {
            replication_status: Some(if state.synchronized_family() {
                stor_port::types::v0::transport::ReplicationStatus::Enabled
            } else {
                stor_port::types::v0::transport::ReplicationStatus::Error
            }),
            ..Default::default()
        }))
    }
}
