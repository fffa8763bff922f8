//! Consistency groups. The caller's database is the durable record of
//! membership; the array-side FlashCopy consistency group only exists for
//! the duration of a group snapshot or group clone, so group create,
//! update and delete reduce to member-volume operations.

use crate::service::Service;
use crate::volume::specs::vdisk_options;
use agents::errors::SvcError;
use stor_port::types::v0::transport::{
    CreateGroupFromSource, CreateGroupSnapshot, DestroySnapshot, DestroyVolume, GroupId,
    GroupSnapshotId, VdiskName, VdiskOptions, Volume, VolumeStatus,
};

/// Name of the scratch consistency group used for one group snapshot.
fn cg_snapshot_name(uuid: &GroupSnapshotId) -> String {
    format!("cg_snap-{uuid}")
}

/// Name of the scratch consistency group used for one group clone.
fn cg_clone_name(group: &GroupId) -> String {
    format!("cg_clone-{group}")
}

impl Service {
    /// Create a consistency group. Membership lives in the caller's
    /// database; there is nothing to create on the array.
    pub(crate) async fn create_group(&self, group: &GroupId) -> Result<(), SvcError> {
        tracing::debug!(group.uuid=%group, "Consistency group created");
        Ok(())
    }

    /// Delete a consistency group by deleting its member volumes. Every
    /// member is attempted; the first failure is reported after the
    /// remaining members have been tried.
    pub(crate) async fn delete_group(
        &self,
        group: &GroupId,
        volumes: &[DestroyVolume],
    ) -> Result<(), SvcError> {
        let mut first_error = None;
        for volume in volumes {
            if let Err(error) = self.delete_volume(volume).await {
                tracing::error!(group.uuid=%group, volume.uuid=%volume.uuid, error=%error,
                    "Failed to delete a group member volume"
                );
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Update group membership. Both adding and removing members is pure
    /// bookkeeping on the caller's side.
    pub(crate) async fn update_group(
        &self,
        group: &GroupId,
        add_volumes: &[Volume],
        remove_volumes: &[Volume],
    ) -> Result<(), SvcError> {
        tracing::debug!(group.uuid=%group,
            added = add_volumes.len(),
            removed = remove_volumes.len(),
            "Consistency group membership updated"
        );
        Ok(())
    }

    /// Snapshot a consistency group atomically: one target vdisk and one
    /// zero-rate mapping per member, all tagged with the same scratch
    /// consistency group, prepared and started as a unit. On any member
    /// failure the whole fan-out rolls back - mappings, the group object
    /// and every target vdisk created so far - before the error
    /// propagates.
    pub(crate) async fn create_group_snapshot(
        &self,
        request: &CreateGroupSnapshot,
    ) -> Result<(), SvcError> {
        let registry = self.registry();
        let cg_name = cg_snapshot_name(&request.uuid);

        let mut created: Vec<VdiskName> = vec![];
        let mut pairs = vec![];
        let result = async {
            for member in &request.members {
                let source = self.existing_vdisk(&member.source_name).await?;
                registry
                    .client()
                    .mkvdisk(
                        &member.name,
                        &source.pool,
                        source.capacity,
                        &VdiskOptions::default(),
                    )
                    .await?;
                created.push(member.name.clone());
                pairs.push((member.source_name.clone(), member.name.clone()));
            }
            registry.run_group_flashcopies(&cg_name, &pairs, false).await
        }
        .await;

        if let Err(error) = result {
            tracing::error!(group.uuid=%request.group, cgsnapshot.uuid=%request.uuid, error=%error,
                "Group snapshot failed, rolling back every member target"
            );
            self.rollback_targets(&created).await;
            return Err(error);
        }
        Ok(())
    }

    /// Delete a group snapshot by releasing every member target vdisk.
    pub(crate) async fn delete_group_snapshot(
        &self,
        uuid: &GroupSnapshotId,
        members: &[DestroySnapshot],
    ) -> Result<(), SvcError> {
        let mut first_error = None;
        for member in members {
            if let Err(error) = self.delete_snapshot(member).await {
                tracing::error!(cgsnapshot.uuid=%uuid, snapshot.uuid=%member.uuid, error=%error,
                    "Failed to delete a group snapshot member"
                );
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Create a consistency group from a source: either a snapshot set or
    /// the members of another group. Every member volume is carved with
    /// its own type options and filled with a full copy, started
    /// atomically under one scratch group. Full rollback on any failure.
    pub(crate) async fn create_group_from_source(
        &self,
        request: &CreateGroupFromSource,
    ) -> Result<Vec<Volume>, SvcError> {
        let registry = self.registry();
        let cg_name = cg_clone_name(&request.group);

        let mut created: Vec<VdiskName> = vec![];
        let mut pairs = vec![];
        let result = async {
            for member in &request.members {
                let source = self.existing_vdisk(&member.source_name).await?;
                if member.volume.size < source.capacity {
                    return Err(SvcError::SourceSizeInvalid {
                        uuid: member.volume.uuid.clone(),
                        size: member.volume.size,
                        source_size: source.capacity,
                    });
                }
                let opts = vdisk_options(registry, &member.volume.type_spec)?;
                registry
                    .client()
                    .mkvdisk(&member.volume.name, &member.volume.pool, member.volume.size, &opts)
                    .await?;
                created.push(member.volume.name.clone());
                pairs.push((member.source_name.clone(), member.volume.name.clone()));
            }
            registry.run_group_flashcopies(&cg_name, &pairs, true).await
        }
        .await;

        if let Err(error) = result {
            tracing::error!(group.uuid=%request.group, error=%error,
                "Group clone failed, rolling back every member target"
            );
            self.rollback_targets(&created).await;
            return Err(error);
        }

        let mut volumes = vec![];
        for member in &request.members {
            let opts = vdisk_options(registry, &member.volume.type_spec)?;
            if let Some(rate) = opts.iothrottling {
                registry.client().chvdisk_rate(&member.volume.name, rate).await?;
            }
            volumes.push(Volume {
                uuid: member.volume.uuid.clone(),
                name: member.volume.name.clone(),
                size: member.volume.size,
                status: VolumeStatus::Available,
                replication_status: Default::default(),
            });
        }
        Ok(volumes)
    }

    /// Best-effort deletion of the target vdisks a failed fan-out left
    /// behind.
    async fn rollback_targets(&self, created: &[VdiskName]) {
        for name in created {
            if let Err(error) = self.delete_vdisk(name, true).await {
                tracing::warn!(vdisk=%name, error=%error,
                    "Failed to roll back a group fan-out target vdisk"
                );
            }
        }
    }
}
