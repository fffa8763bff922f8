//! Migrate and retype through the array's mirrored-copy primitive: a new
//! copy is added in the destination pool and synchronises in the
//! background while the volume stays online; the copy-ops reconciler
//! removes the original copy once the new one reports in-sync.

use super::specs::{retype_plan, vdisk_options, InplaceChange};
use crate::service::Service;
use agents::errors::SvcError;
use stor_port::types::v0::{
    store::volume::VdiskCopyOp,
    transport::{
        MigrateVolume, PoolId, ReplicationStatus, RetypeVolume, VdiskName, VdiskOptions,
        VolumeId, VolumeUpdate,
    },
};

impl Service {
    /// Add a mirrored copy of `name` in `dest_pool` and register the
    /// pending pair for reconciliation. A vdisk already carrying two
    /// copies is at the array's limit: always refused.
    pub(crate) async fn add_vdisk_copy(
        &self,
        uuid: &VolumeId,
        name: &VdiskName,
        dest_pool: &PoolId,
        opts: &VdiskOptions,
    ) -> Result<VdiskCopyOp, SvcError> {
        let registry = self.registry();
        // probe the array rather than the cache: the destination pool may
        // be newer than the last topology refresh
        if registry.client().lsmdiskgrp_named(dest_pool).await?.is_none() {
            return Err(SvcError::PoolNotFound {
                pool: dest_pool.clone(),
            });
        }
        let copies = registry.client().lsvdiskcopy(name).await?;
        if copies.len() >= 2 {
            return Err(SvcError::MaximumCopies {
                vdisk: name.clone(),
            });
        }
        let orig_copy_id = copies
            .first()
            .map(|copy| copy.copy_id.clone())
            .ok_or_else(|| SvcError::Internal {
                details: format!("Vdisk '{name}' reports no copies at all"),
            })?;
        let new_copy_id = registry
            .client()
            .addvdiskcopy(name, dest_pool, opts)
            .await?;
        let op = VdiskCopyOp::new(orig_copy_id, new_copy_id);
        if let Err(error) = registry.register_copy_op(uuid, name, op.clone()).await {
            // an untracked copy would never be reconciled away: take it
            // back out
            if let Err(cleanup_error) = registry.client().rmvdiskcopy(name, &op.new_copy_id).await
            {
                tracing::warn!(vdisk=%name, copy.id=%op.new_copy_id, error=%cleanup_error,
                    "Failed to remove the vdisk copy after a tracking failure"
                );
            }
            return Err(error);
        }
        tracing::info!(volume.uuid=%uuid, vdisk=%name, pool=%dest_pool,
            orig.copy=%op.orig_copy_id, new.copy=%op.new_copy_id,
            "Vdisk copy registered, the original will be removed once synchronised"
        );
        Ok(op)
    }

    /// Move a volume to another pool keeping its type. Same-pool moves are
    /// complete immediately.
    pub(crate) async fn migrate_volume(&self, request: &MigrateVolume) -> Result<(), SvcError> {
        let vdisk = self.existing_vdisk(&request.name).await?;
        if vdisk.pool == request.dest_pool {
            return Ok(());
        }
        let opts = vdisk_options(self.registry(), &request.type_spec)?;
        self.add_vdisk_copy(&request.uuid, &request.name, &request.dest_pool, &opts)
            .await?;
        Ok(())
    }

    /// Synchronisation progress of an in-flight migrate/retype, 0 to 100.
    /// A volume with no pending copy reports complete.
    pub(crate) async fn migration_progress(&self, uuid: &VolumeId) -> Result<u32, SvcError> {
        let ops = self.registry().copy_ops().await;
        let Some((name, pending)) = ops.get(uuid) else {
            return Ok(100);
        };
        let mut progress = 100;
        for op in pending.ops() {
            let copy_progress = self
                .registry()
                .client()
                .lsvdisksyncprogress(name, &op.new_copy_id)
                .await?;
            progress = progress.min(copy_progress);
        }
        Ok(progress)
    }

    /// Move a volume to another type. Pool moves and allocation changes
    /// (thin/thick, compression, grain size) go through the mirrored-copy
    /// mechanism; everything else is altered in place and must never
    /// trigger a copy.
    pub(crate) async fn retype(&self, request: &RetypeVolume) -> Result<VolumeUpdate, SvcError> {
        let registry = self.registry();
        let old_opts = vdisk_options(registry, &request.current_type)?;
        let new_opts = vdisk_options(registry, &request.new_type)?;
        let pool_changed = request.current_pool != request.new_pool;
        let plan = retype_plan(&old_opts, &new_opts, pool_changed);

        if plan.needs_copy {
            self.add_vdisk_copy(&request.uuid, &request.name, &request.new_pool, &new_opts)
                .await?;
        }
        for change in &plan.inplace {
            match change {
                InplaceChange::IoGroup(iogrp) => {
                    registry.client().movevdisk(&request.name, *iogrp).await?
                }
                InplaceChange::EasyTier(on) => {
                    registry.client().chvdisk_easytier(&request.name, *on).await?
                }
                InplaceChange::Warning(warning) => {
                    registry
                        .client()
                        .chvdisk_warning(&request.name, *warning)
                        .await?
                }
                InplaceChange::Autoexpand(on) => {
                    registry
                        .client()
                        .chvdisk_autoexpand(&request.name, *on)
                        .await?
                }
            }
        }
        if old_opts.iothrottling != new_opts.iothrottling {
            registry
                .client()
                .chvdisk_rate(&request.name, new_opts.iothrottling.unwrap_or(0))
                .await?;
        }

        let mut update = VolumeUpdate::default();
        match (old_opts.replication.is_some(), new_opts.replication.is_some()) {
            (false, true) => {
                let vdisk = self.existing_vdisk(&request.name).await?;
                self.replication()?
                    .volume_replication_setup(&request.name, vdisk.capacity, &new_opts)
                    .await?;
                update.replication_status = Some(ReplicationStatus::Enabled);
            }
            (true, false) => {
                self.replication()?
                    .volume_replication_teardown(&request.name)
                    .await?;
                update.replication_status = Some(ReplicationStatus::Disabled);
            }
            _ => {}
        }
        Ok(update)
    }
}
