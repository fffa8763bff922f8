//! Remote-mirror replication. Two interchangeable strategies implement the
//! same contract: Global Mirror (asynchronous, unbounded lag) and Metro
//! Mirror (synchronous). The strategy is selected once at setup from the
//! replication target configuration and held as an owned trait object.

/// The Global Mirror strategy.
pub(crate) mod global;
/// The Metro Mirror strategy.
pub(crate) mod metro;

use crate::controller::registry::{Registry, ReplicationTargetConfig};
use agents::errors::SvcError;
use global::GlobalMirror;
use metro::MetroMirror;
use stor_port::transport_api::ResourceKind;
use stor_port::types::v0::transport::{
    PartnershipState, RcState, RelationshipName, ReplicationMode, ReplicationStatus, VdiskName,
    VdiskOptions, Volume, VolumeUpdate,
};

/// The replication contract consumed by the volume lifecycle.
#[async_trait::async_trait]
pub(crate) trait ReplicationStrategy: Send + Sync {
    /// The replication flavour this strategy establishes.
    fn mode(&self) -> ReplicationMode;
    /// Make sure a started partnership with the target cluster exists.
    async fn establish_target_partnership(&self) -> Result<(), SvcError>;
    /// Carve the auxiliary vdisk on the target cluster and wire up a
    /// started relationship for the given volume.
    async fn volume_replication_setup(
        &self,
        name: &VdiskName,
        size: u64,
        opts: &VdiskOptions,
    ) -> Result<(), SvcError>;
    /// Create and start the mirror relationship for an existing pair.
    async fn create_relationship(&self, name: &VdiskName) -> Result<(), SvcError>;
    /// Remove the mirror relationship, leaving both vdisks in place.
    async fn delete_relationship(&self, name: &VdiskName) -> Result<(), SvcError>;
    /// Tear replication down completely: the relationship and the
    /// auxiliary vdisk.
    async fn volume_replication_teardown(&self, name: &VdiskName) -> Result<(), SvcError>;
    /// The relationship state, when a relationship exists.
    async fn get_relationship_status(&self, name: &VdiskName)
        -> Result<Option<RcState>, SvcError>;
    /// Grow the auxiliary vdisk by `delta` bytes.
    async fn extend_target_volume(&self, name: &VdiskName, delta: u64) -> Result<(), SvcError>;
    /// Fail one volume over to the target cluster. A mismatched backend id
    /// is a no-op returning no update.
    async fn failover_volume_host(
        &self,
        backend_id: &str,
        volume: &Volume,
    ) -> Result<Option<VolumeUpdate>, SvcError>;
    /// Verify one volume is safe to fail back, without acting.
    async fn check_failback_ready(&self, volume: &Volume) -> Result<(), SvcError>;
    /// Fail one volume back to the local cluster.
    async fn replication_failback(&self, volume: &Volume) -> Result<VolumeUpdate, SvcError>;
}

/// Build the strategy for the configured replication target.
pub(crate) fn strategy_for(
    registry: Registry,
    target: ReplicationTargetConfig,
) -> Box<dyn ReplicationStrategy> {
    let context = ReplicationContext::new(registry, target.clone());
    match target.mode {
        ReplicationMode::Global => Box::new(GlobalMirror::new(context)),
        ReplicationMode::Metro => Box::new(MetroMirror::new(context)),
    }
}

/// The shared mechanics behind both strategies: partnership management,
/// auxiliary vdisk lifecycle and relationship plumbing. Only the
/// relationship flavour differs between the strategies.
pub(crate) struct ReplicationContext {
    registry: Registry,
    target: ReplicationTargetConfig,
}

impl ReplicationContext {
    /// Return a new `Self`.
    pub(crate) fn new(registry: Registry, target: ReplicationTargetConfig) -> Self {
        Self { registry, target }
    }

    /// Name of the auxiliary vdisk mirroring `name` on the target.
    fn aux_name(name: &VdiskName) -> VdiskName {
        VdiskName::from(format!("aux_{name}"))
    }

    /// Name of the relationship mirroring `name`.
    fn rcrel_name(name: &VdiskName) -> RelationshipName {
        RelationshipName::from(format!("rcrel_{name}"))
    }

    fn target_client(&self) -> Result<&crate::cli::client::CliClient, SvcError> {
        self.registry
            .target_client()
            .ok_or(SvcError::ReplicationNotConfigured {})
    }

    /// Make sure a started partnership with the target cluster exists,
    /// creating it over IP or Fibre Channel as configured.
    pub(crate) async fn establish_target_partnership(&self) -> Result<(), SvcError> {
        let partnerships = self.registry.client().lspartnership().await?;
        let existing = partnerships
            .iter()
            .find(|partnership| partnership.name == self.target.cluster_name);
        match existing {
            Some(partnership) if partnership.state == PartnershipState::FullyConfigured => {
                return Ok(())
            }
            Some(partnership) => {
                self.registry
                    .client()
                    .chpartnership_start(&partnership.id)
                    .await?;
                return Ok(());
            }
            None => {}
        }
        match &self.target.remote_ip {
            Some(remote_ip) => {
                self.registry
                    .client()
                    .mkippartnership(remote_ip, self.target.bandwidth_mbps)
                    .await?;
            }
            None => {
                let candidates = self.registry.client().lspartnershipcandidate().await?;
                let candidate = candidates
                    .iter()
                    .find(|(_, name)| name == &self.target.cluster_name)
                    .ok_or_else(|| {
                        SvcError::not_found(ResourceKind::Partnership, &self.target.cluster_name)
                    })?;
                self.registry
                    .client()
                    .mkfcpartnership(candidate.1.as_str(), self.target.bandwidth_mbps)
                    .await?;
            }
        }
        let partnerships = self.registry.client().lspartnership().await?;
        if let Some(partnership) = partnerships
            .iter()
            .find(|partnership| partnership.name == self.target.cluster_name)
        {
            self.registry
                .client()
                .chpartnership_start(&partnership.id)
                .await?;
        }
        tracing::info!(target=%self.target.cluster_name, "Partnership with the replication target established");
        Ok(())
    }

    /// Carve the auxiliary vdisk and wire up a started relationship. A
    /// failure after the auxiliary was carved deletes it again before the
    /// error propagates.
    pub(crate) async fn volume_replication_setup(
        &self,
        mode: ReplicationMode,
        name: &VdiskName,
        size: u64,
        opts: &VdiskOptions,
    ) -> Result<(), SvcError> {
        let aux = Self::aux_name(name);
        self.target_client()?
            .mkvdisk(&aux, &self.target.pool, size, opts)
            .await?;
        if let Err(error) = self.create_relationship(mode, name).await {
            if let Err(cleanup_error) = self.target_client()?.rmvdisk(&aux, true).await {
                tracing::warn!(vdisk=%aux, error=%cleanup_error,
                    "Failed to delete the auxiliary vdisk after a relationship failure"
                );
            }
            return Err(error);
        }
        Ok(())
    }

    /// Create and start the relationship for an existing master/aux pair.
    pub(crate) async fn create_relationship(
        &self,
        mode: ReplicationMode,
        name: &VdiskName,
    ) -> Result<(), SvcError> {
        let rcrel = Self::rcrel_name(name);
        self.registry
            .client()
            .mkrcrelationship(&rcrel, name, &Self::aux_name(name), &self.target.cluster_id(), mode)
            .await?;
        self.registry.client().startrcrelationship(&rcrel, None).await
    }

    /// Remove the relationship, tolerating it being gone already. The
    /// vdisks on both sides stay.
    pub(crate) async fn delete_relationship(&self, name: &VdiskName) -> Result<(), SvcError> {
        let rcrel = Self::rcrel_name(name);
        if self.registry.client().lsrcrelationship(&rcrel).await?.is_some() {
            self.registry.client().rmrcrelationship(&rcrel, true).await?;
        }
        Ok(())
    }

    /// Tear replication down completely: the relationship and then the
    /// auxiliary vdisk. Both halves tolerate the object being gone.
    pub(crate) async fn volume_replication_teardown(
        &self,
        name: &VdiskName,
    ) -> Result<(), SvcError> {
        self.delete_relationship(name).await?;
        let aux = Self::aux_name(name);
        if self.target_client()?.lsvdisk(&aux).await?.is_some() {
            self.target_client()?.rmvdisk(&aux, true).await?;
        }
        Ok(())
    }

    /// The relationship state, when a relationship exists.
    pub(crate) async fn get_relationship_status(
        &self,
        name: &VdiskName,
    ) -> Result<Option<RcState>, SvcError> {
        let relationship = self
            .registry
            .client()
            .lsrcrelationship(&Self::rcrel_name(name))
            .await?;
        Ok(relationship.map(|relationship| relationship.state))
    }

    /// Grow the auxiliary vdisk by `delta` bytes.
    pub(crate) async fn extend_target_volume(
        &self,
        name: &VdiskName,
        delta: u64,
    ) -> Result<(), SvcError> {
        self.target_client()?
            .expandvdisksize(&Self::aux_name(name), delta)
            .await
    }

    /// Fail one volume over: stop the relationship granting write access
    /// to the auxiliary side. Driven through the target cluster since the
    /// local one may be gone.
    pub(crate) async fn failover_volume_host(
        &self,
        backend_id: &str,
        volume: &Volume,
    ) -> Result<Option<VolumeUpdate>, SvcError> {
        if backend_id != self.target.backend_id {
            // not our target: the caller must not assume this volume
            // failed over
            return Ok(None);
        }
        let rcrel = Self::rcrel_name(&volume.name);
        let relationship = self.target_client()?.lsrcrelationship(&rcrel).await?;
        match relationship {
            Some(_) => {
                self.target_client()?.stoprcrelationship(&rcrel, true).await?;
                Ok(Some(VolumeUpdate {
                    replication_status: Some(ReplicationStatus::FailedOver),
                    ..Default::default()
                }))
            }
            None => Ok(Some(VolumeUpdate {
                status: Some(stor_port::types::v0::transport::VolumeStatus::Error),
                replication_status: Some(ReplicationStatus::Error),
                ..Default::default()
            })),
        }
    }

    /// Refuse the failback of a volume whose relationship is not in a
    /// synchronized-family state.
    pub(crate) async fn check_failback_ready(&self, volume: &Volume) -> Result<(), SvcError> {
        let state = self.get_relationship_status(&volume.name).await?;
        match state {
            Some(state) if state.synchronized_family() => Ok(()),
            Some(state) => Err(SvcError::FailbackNotReady {
                volume: volume.uuid.clone(),
                state: state.to_string(),
            }),
            None => Err(SvcError::FailbackNotReady {
                volume: volume.uuid.clone(),
                state: "no relationship".to_string(),
            }),
        }
    }

    /// Fail one volume back: make the master side primary again.
    pub(crate) async fn replication_failback(
        &self,
        volume: &Volume,
    ) -> Result<VolumeUpdate, SvcError> {
        let rcrel = Self::rcrel_name(&volume.name);
        self.registry
            .client()
            .switchrcrelationship(&rcrel, true)
            .await?;
        Ok(VolumeUpdate {
            replication_status: Some(ReplicationStatus::Enabled),
            ..Default::default()
        })
    }
}

impl ReplicationTargetConfig {
    /// The target cluster addressed the way the relationship verbs expect.
    fn cluster_id(&self) -> stor_port::types::v0::transport::ClusterId {
        stor_port::types::v0::transport::ClusterId::from(self.cluster_name.as_str())
    }
}
