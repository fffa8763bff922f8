use super::specs::vdisk_options;
use crate::service::Service;
use agents::errors::SvcError;
use stor_port::transport_api::ResourceKind;
use stor_port::types::v0::transport::{
    CloneVolume, CreateSnapshot, CreateVolume, CreateVolumeFromSnapshot, DestroySnapshot,
    DestroyVolume, ExtendVolume, ManageExistingVolume, PoolStats, ReplicationStatus, Vdisk,
    VdiskName, VdiskOptions, Volume, VolumeStatus,
};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

impl Service {
    /// Create a volume: carve the vdisk, apply the QoS throttle, and wire
    /// up replication when the type requests it.
    pub(crate) async fn create_volume(&self, request: &CreateVolume) -> Result<Volume, SvcError> {
        let registry = self.registry();
        registry.pool(&request.pool)?;
        let opts = vdisk_options(registry, &request.type_spec)?;

        registry
            .client()
            .mkvdisk(&request.name, &request.pool, request.size, &opts)
            .await?;
        match self.finish_new_vdisk(&request.name, request.size, &opts).await {
            Ok(replication_status) => Ok(Volume {
                uuid: request.uuid.clone(),
                name: request.name.clone(),
                size: request.size,
                status: VolumeStatus::Available,
                replication_status,
            }),
            Err(error) => {
                self.undo_new_vdisk(&request.name, &error).await;
                Err(error)
            }
        }
    }

    /// Post-carve steps shared by create/clone/from-snapshot: QoS throttle
    /// and replication setup.
    async fn finish_new_vdisk(
        &self,
        name: &VdiskName,
        size: u64,
        opts: &VdiskOptions,
    ) -> Result<ReplicationStatus, SvcError> {
        if let Some(rate) = opts.iothrottling {
            self.registry().client().chvdisk_rate(name, rate).await?;
        }
        if opts.replication.is_some() {
            self.replication()?
                .volume_replication_setup(name, size, opts)
                .await?;
            return Ok(ReplicationStatus::Enabled);
        }
        Ok(ReplicationStatus::Disabled)
    }

    /// Delete the vdisk a failed multi-step create leaves behind.
    async fn undo_new_vdisk(&self, name: &VdiskName, error: &SvcError) {
        tracing::error!(vdisk=%name, error=%error, "Volume creation failed, deleting the vdisk");
        if let Err(cleanup_error) = self.registry().client().rmvdisk(name, true).await {
            tracing::warn!(vdisk=%name, error=%cleanup_error,
                "Failed to delete the vdisk of the failed create"
            );
        }
    }

    /// Delete a volume. Deleting a source with dependent snapshots is
    /// permitted: each zero-rate mapping out of it is converted to a real
    /// copy and awaited first. A vdisk that is already gone is not an
    /// error.
    pub(crate) async fn delete_volume(&self, request: &DestroyVolume) -> Result<(), SvcError> {
        // drop any pending migrate/retype bookkeeping for this volume
        let ops = self.registry().copy_ops().await;
        if let Some((_, pending)) = ops.get(&request.uuid) {
            for op in pending.ops().to_vec() {
                self.registry().remove_copy_op(&request.uuid, &op).await?;
            }
        }
        if self.replication_enabled() {
            self.replication()?
                .volume_replication_teardown(&request.name)
                .await?;
        }
        self.delete_vdisk(&request.name, false).await
    }

    /// Drive all mappings of a vdisk to a terminal condition and delete
    /// it.
    pub(crate) async fn delete_vdisk(&self, name: &VdiskName, force: bool) -> Result<(), SvcError> {
        let registry = self.registry();
        if registry.client().lsvdisk(name).await?.is_none() {
            tracing::warn!(vdisk=%name, "Vdisk does not exist, nothing to delete");
            return Ok(());
        }
        registry
            .ensure_vdisk_no_fc_mappings(name, true, force)
            .await?;
        for mapping in registry.client().lsvdiskhostmap(name).await? {
            registry
                .client()
                .rmvdiskhostmap(&mapping.host, name)
                .await?;
        }
        registry.client().rmvdisk(name, force).await
    }

    /// Extend a volume. Snapshots pin the allocation layout, so the vdisk
    /// must not carry any FlashCopy mapping.
    pub(crate) async fn extend_volume(&self, request: &ExtendVolume) -> Result<(), SvcError> {
        if request.new_size <= request.size {
            return Err(SvcError::ResizeInvalid {
                uuid: request.uuid.clone(),
                size: request.size,
                new_size: request.new_size,
            });
        }
        let registry = self.registry();
        let vdisk = self.existing_vdisk(&request.name).await?;
        registry
            .ensure_vdisk_no_fc_mappings(&request.name, false, false)
            .await?;
        let delta = request.new_size - request.size;
        if vdisk.rc_name.is_some() {
            // a relationship pins both sides: recreate it around the grow
            let strategy = self.replication()?;
            strategy.delete_relationship(&request.name).await?;
            registry
                .client()
                .expandvdisksize(&request.name, delta)
                .await?;
            strategy.extend_target_volume(&request.name, delta).await?;
            strategy.create_relationship(&request.name).await?;
            return Ok(());
        }
        registry.client().expandvdisksize(&request.name, delta).await
    }

    /// Create a point-in-time snapshot: a zero-rate FlashCopy mapping onto
    /// a fresh target vdisk matching the source geometry.
    pub(crate) async fn create_snapshot(&self, request: &CreateSnapshot) -> Result<(), SvcError> {
        let registry = self.registry();
        let source = self.existing_vdisk(&request.source_name).await?;
        let opts = VdiskOptions::default();
        registry
            .client()
            .mkvdisk(&request.name, &source.pool, source.capacity, &opts)
            .await?;
        if let Err(error) = registry
            .run_flashcopy(&request.source_name, &request.name, false)
            .await
        {
            // the caller owns nothing yet: release the half-created target
            self.undo_new_vdisk(&request.name, &error).await;
            return Err(error);
        }
        Ok(())
    }

    /// Delete a snapshot, fully releasing its target vdisk.
    pub(crate) async fn delete_snapshot(&self, request: &DestroySnapshot) -> Result<(), SvcError> {
        self.delete_vdisk(&request.name, true).await
    }

    /// Create a volume out of a snapshot: a full-copy FlashCopy from the
    /// snapshot target onto the new vdisk.
    pub(crate) async fn create_volume_from_snapshot(
        &self,
        request: &CreateVolumeFromSnapshot,
    ) -> Result<Volume, SvcError> {
        if request.volume.size < request.snapshot_size {
            return Err(SvcError::SourceSizeInvalid {
                uuid: request.volume.uuid.clone(),
                size: request.volume.size,
                source_size: request.snapshot_size,
            });
        }
        self.copy_into_new_volume(&request.volume, &request.snapshot_name)
            .await
    }

    /// Clone a volume with a full-copy FlashCopy.
    pub(crate) async fn create_cloned_volume(
        &self,
        request: &CloneVolume,
    ) -> Result<Volume, SvcError> {
        if request.volume.size < request.source_size {
            return Err(SvcError::SourceSizeInvalid {
                uuid: request.volume.uuid.clone(),
                size: request.volume.size,
                source_size: request.source_size,
            });
        }
        self.copy_into_new_volume(&request.volume, &request.source_name)
            .await
    }

    /// Carve the new vdisk, full-copy `source` onto it, then apply QoS and
    /// replication. Any failure deletes the new vdisk before propagating.
    async fn copy_into_new_volume(
        &self,
        volume: &CreateVolume,
        source: &VdiskName,
    ) -> Result<Volume, SvcError> {
        let registry = self.registry();
        registry.pool(&volume.pool)?;
        self.existing_vdisk(source).await?;
        let opts = vdisk_options(registry, &volume.type_spec)?;
        registry
            .client()
            .mkvdisk(&volume.name, &volume.pool, volume.size, &opts)
            .await?;
        let result = async {
            registry.run_flashcopy(source, &volume.name, true).await?;
            self.finish_new_vdisk(&volume.name, volume.size, &opts).await
        }
        .await;
        match result {
            Ok(replication_status) => Ok(Volume {
                uuid: volume.uuid.clone(),
                name: volume.name.clone(),
                size: volume.size,
                status: VolumeStatus::Available,
                replication_status,
            }),
            Err(error) => {
                self.undo_new_vdisk(&volume.name, &error).await;
                Err(error)
            }
        }
    }

    /// Take over an existing vdisk as a managed volume. The vdisk must
    /// live in the expected pool, must not be mirrored to another cluster,
    /// and its allocation must match the volume type.
    pub(crate) async fn manage_existing(
        &self,
        request: &ManageExistingVolume,
    ) -> Result<Volume, SvcError> {
        let registry = self.registry();
        let vdisk = self.existing_vdisk(&request.existing_name).await?;
        if vdisk.pool != request.pool {
            return Err(SvcError::ManageMismatch {
                vdisk: request.existing_name.clone(),
                reason: format!(
                    "the vdisk lives in pool '{}', not in the expected pool '{}'",
                    vdisk.pool, request.pool
                ),
            });
        }
        if vdisk.rc_name.is_some() {
            return Err(SvcError::ManageMismatch {
                vdisk: request.existing_name.clone(),
                reason: "the vdisk is part of a remote copy relationship".to_string(),
            });
        }
        let opts = vdisk_options(registry, &request.type_spec)?;
        if let Some(copy) = vdisk.primary_copy() {
            if copy.compressed != opts.compressed {
                return Err(SvcError::ManageMismatch {
                    vdisk: request.existing_name.clone(),
                    reason: "the compression of the vdisk does not match the volume type"
                        .to_string(),
                });
            }
        }
        registry
            .client()
            .rename_vdisk(&request.existing_name, &request.name)
            .await?;
        Ok(Volume {
            uuid: request.uuid.clone(),
            name: request.name.clone(),
            size: vdisk.capacity,
            status: VolumeStatus::Available,
            replication_status: ReplicationStatus::Disabled,
        })
    }

    /// Size of an existing vdisk, for the manage-existing precondition
    /// checks of the caller.
    pub(crate) async fn manage_existing_get_size(
        &self,
        existing_name: &VdiskName,
    ) -> Result<u64, SvcError> {
        Ok(self.existing_vdisk(existing_name).await?.capacity)
    }

    /// Per-pool capacity and capability summary for the scheduler.
    pub(crate) async fn get_volume_stats(&self) -> Result<Vec<PoolStats>, SvcError> {
        let registry = self.registry();
        registry.refresh_state().await?;
        let compression = registry.compression_enabled();
        let state = registry.state();
        Ok(state
            .pools
            .values()
            .map(|pool| PoolStats {
                pool_name: pool.name.clone(),
                total_capacity_gb: pool.capacity as f64 / GIB,
                free_capacity_gb: pool.free_capacity as f64 / GIB,
                provisioned_capacity_gb: pool.virtual_capacity as f64 / GIB,
                thin_provisioning_support: true,
                compression_support: compression,
                easytier_support: pool.easy_tier,
                multiattach: true,
            })
            .collect())
    }

    /// Look a vdisk up, converting absence into the typed not-found
    /// error for callers which require it to exist.
    pub(crate) async fn existing_vdisk(&self, name: &VdiskName) -> Result<Vdisk, SvcError> {
        self.registry()
            .client()
            .lsvdisk(name)
            .await?
            .ok_or_else(|| SvcError::not_found(ResourceKind::Vdisk, name))
    }
}
