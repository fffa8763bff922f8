use super::{ReplicationContext, ReplicationStrategy};
use agents::errors::SvcError;
use stor_port::types::v0::transport::{
    RcState, ReplicationMode, VdiskName, VdiskOptions, Volume, VolumeUpdate,
};

/// Global Mirror: asynchronous replication with unbounded lag. Writes
/// complete locally and trickle to the auxiliary cluster in the
/// background.
pub(crate) struct GlobalMirror {
    context: ReplicationContext,
}

impl GlobalMirror {
    /// Return a new `Self` over the shared replication mechanics.
    pub(crate) fn new(context: ReplicationContext) -> Self {
        Self { context }
    }
}

#[async_trait::async_trait]
impl ReplicationStrategy for GlobalMirror {
    fn mode(&self) -> ReplicationMode {
        ReplicationMode::Global
    }

    async fn establish_target_partnership(&self) -> Result<(), SvcError> {
        self.context.establish_target_partnership().await
    }

    async fn volume_replication_setup(
        &self,
        name: &VdiskName,
        size: u64,
        opts: &VdiskOptions,
    ) -> Result<(), SvcError> {
        self.context
            .volume_replication_setup(self.mode(), name, size, opts)
            .await
    }

    async fn create_relationship(&self, name: &VdiskName) -> Result<(), SvcError> {
        self.context.create_relationship(self.mode(), name).await
    }

    async fn delete_relationship(&self, name: &VdiskName) -> Result<(), SvcError> {
        self.context.delete_relationship(name).await
    }

    async fn volume_replication_teardown(&self, name: &VdiskName) -> Result<(), SvcError> {
        self.context.volume_replication_teardown(name).await
    }

    async fn get_relationship_status(
        &self,
        name: &VdiskName,
    ) -> Result<Option<RcState>, SvcError> {
        self.context.get_relationship_status(name).await
    }

    async fn extend_target_volume(&self, name: &VdiskName, delta: u64) -> Result<(), SvcError> {
        self.context.extend_target_volume(name, delta).await
    }

    async fn failover_volume_host(
        &self,
        backend_id: &str,
        volume: &Volume,
    ) -> Result<Option<VolumeUpdate>, SvcError> {
        self.context.failover_volume_host(backend_id, volume).await
    }

    async fn check_failback_ready(&self, volume: &Volume) -> Result<(), SvcError> {
        self.context.check_failback_ready(volume).await
    }

    async fn replication_failback(&self, volume: &Volume) -> Result<VolumeUpdate, SvcError> {
        self.context.replication_failback(volume).await
    }
}
