//! FlashCopy orchestration: create-and-wait-for-prepared, consistency
//! group fan-out, and the convergence loop which drives every mapping
//! referencing a vdisk to a safe terminal condition before the vdisk is
//! deleted or extended.

use super::states::{transition, FcState, FcTrigger};
use crate::controller::registry::Registry;
use agents::errors::SvcError;
use stor_port::transport_api::ResourceKind;
use stor_port::types::v0::transport::{FcMapStatus, VdiskName};

impl Registry {
    /// Create a mapping from `source` onto `target`, drive it to
    /// `prepared` and start it. Returns the mapping id. On failure the
    /// caller owns the cleanup of the half-created target vdisk.
    pub(crate) async fn run_flashcopy(
        &self,
        source: &VdiskName,
        target: &VdiskName,
        full_copy: bool,
    ) -> Result<String, SvcError> {
        let copy_rate = if full_copy {
            self.config().fc_copy_rate
        } else {
            0
        };
        let map_id = self
            .client()
            .mkfcmap(source, target, copy_rate, full_copy, None)
            .await?;
        self.prepare_fc_map(&map_id).await?;
        self.client().startfcmap(&map_id).await?;
        tracing::debug!(source=%source, target=%target, fcmap.id=%map_id, "FlashCopy started");
        Ok(map_id)
    }

    /// Drive a mapping to the `prepared` state, bounded by the configured
    /// prepare timeout. A concurrent flush failure can flip the mapping
    /// back to `stopped`, in which case the prepare is re-issued.
    async fn prepare_fc_map(&self, map_id: &str) -> Result<(), SvcError> {
        let mapping = self
            .client()
            .lsfcmap(map_id)
            .await?
            .ok_or_else(|| SvcError::not_found(ResourceKind::FlashCopyMap, map_id))?;
        if mapping.status != FcMapStatus::Prepared {
            transition(map_id, FcState::from(mapping.status), FcTrigger::Prepare, false)?;
            self.client().prestartfcmap(map_id).await?;
        }

        let timeout = self.config().fc_prepare_timeout;
        let started = tokio::time::Instant::now();
        loop {
            let mapping = self
                .client()
                .lsfcmap(map_id)
                .await?
                .ok_or_else(|| SvcError::not_found(ResourceKind::FlashCopyMap, map_id))?;
            match mapping.status {
                FcMapStatus::Prepared => return Ok(()),
                FcMapStatus::Stopped => {
                    transition(map_id, FcState::Stopped, FcTrigger::Prepare, false)?;
                    self.client().prestartfcmap(map_id).await?;
                }
                FcMapStatus::Preparing => {}
                status => {
                    return Err(SvcError::FcMapTransition {
                        name: map_id.to_string(),
                        state: FcState::from(status).to_string(),
                        trigger: FcTrigger::Wait.to_string(),
                    })
                }
            }
            if started.elapsed() >= timeout {
                return Err(SvcError::FcPrepareTimeout {
                    name: map_id.to_string(),
                    timeout,
                    status: mapping.status,
                });
            }
            tokio::time::sleep(self.config().fc_poll_period).await;
        }
    }

    /// Fan a FlashCopy out over `pairs` under one consistency group, so
    /// all mappings start atomically, then delete the group: the array
    /// side group is single-use scratch state, the caller's database is
    /// the durable record of membership. On failure the group is torn
    /// down with its member mappings before the error is returned.
    pub(crate) async fn run_group_flashcopies(
        &self,
        group_name: &str,
        pairs: &[(VdiskName, VdiskName)],
        full_copy: bool,
    ) -> Result<(), SvcError> {
        self.client().mkfcconsistgrp(group_name).await?;
        let result = self.group_flashcopies(group_name, pairs, full_copy).await;
        if let Err(error) = self.delete_fc_consistgrp(group_name).await {
            match &result {
                // surface the teardown failure only when the fan-out
                // itself succeeded
                Ok(()) => return Err(error),
                Err(first) => {
                    tracing::warn!(group=%group_name, error=%error, first_error=%first,
                        "Failed to tear down the FlashCopy consistency group"
                    );
                }
            }
        }
        result
    }

    async fn group_flashcopies(
        &self,
        group_name: &str,
        pairs: &[(VdiskName, VdiskName)],
        full_copy: bool,
    ) -> Result<(), SvcError> {
        let copy_rate = if full_copy {
            self.config().fc_copy_rate
        } else {
            0
        };
        for (source, target) in pairs {
            self.client()
                .mkfcmap(source, target, copy_rate, full_copy, Some(group_name))
                .await?;
        }
        self.prepare_fc_consistgrp(group_name).await?;
        self.client().startfcconsistgrp(group_name).await?;
        Ok(())
    }

    /// Drive a consistency group to the `prepared` state, with the same
    /// bounded polling and stopped-state retry as a standalone mapping.
    async fn prepare_fc_consistgrp(&self, group_name: &str) -> Result<(), SvcError> {
        self.client().prestartfcconsistgrp(group_name).await?;
        let timeout = self.config().fc_prepare_timeout;
        let started = tokio::time::Instant::now();
        loop {
            let group = self
                .client()
                .lsfcconsistgrp(group_name)
                .await?
                .ok_or_else(|| SvcError::not_found(ResourceKind::FlashCopyGroup, group_name))?;
            let state = FcState::from(group.status);
            match state {
                FcState::Prepared => return Ok(()),
                FcState::Stopped => {
                    transition(group_name, state, FcTrigger::Prepare, true)?;
                    self.client().prestartfcconsistgrp(group_name).await?;
                }
                FcState::Preparing => {}
                state => {
                    return Err(SvcError::FcMapTransition {
                        name: group_name.to_string(),
                        state: state.to_string(),
                        trigger: FcTrigger::Wait.to_string(),
                    })
                }
            }
            if started.elapsed() >= timeout {
                return Err(SvcError::FcPrepareTimeout {
                    name: group_name.to_string(),
                    timeout,
                    status: FcMapStatus::Preparing,
                });
            }
            tokio::time::sleep(self.config().fc_poll_period).await;
        }
    }

    /// Delete a consistency group together with any member mappings still
    /// attached to it. A group stuck in `prepared` is stopped first so the
    /// member targets are released cleanly. Deleting a group that is
    /// already gone is a no-op.
    pub(crate) async fn delete_fc_consistgrp(&self, group_name: &str) -> Result<(), SvcError> {
        let Some(group) = self.client().lsfcconsistgrp(group_name).await? else {
            return Ok(());
        };
        if FcState::from(group.status) == FcState::Prepared {
            self.client().stopfcconsistgrp(group_name).await?;
        }
        self.client().rmfcconsistgrp(group_name, true).await
    }

    /// Drive every FlashCopy mapping referencing `name` to a safe terminal
    /// condition and wait until none remains. Mappings are always
    /// advancing towards a terminal state, so the loop converges; there is
    /// no hard timeout, only the fixed poll interval.
    pub(crate) async fn ensure_vdisk_no_fc_mappings(
        &self,
        name: &VdiskName,
        allow_snaps: bool,
        allow_fctgt: bool,
    ) -> Result<(), SvcError> {
        loop {
            if !self
                .check_vdisk_fc_mappings(name, allow_snaps, allow_fctgt)
                .await?
            {
                return Ok(());
            }
            tokio::time::sleep(self.config().fc_poll_period).await;
        }
    }

    /// One pass over the mappings referencing `name`: nudge each towards
    /// a terminal condition and report whether any remained at entry.
    async fn check_vdisk_fc_mappings(
        &self,
        name: &VdiskName,
        allow_snaps: bool,
        allow_fctgt: bool,
    ) -> Result<bool, SvcError> {
        let map_ids = self.client().lsvdiskfcmappings(name).await?;
        if map_ids.is_empty() {
            return Ok(false);
        }
        for map_id in map_ids {
            // the mapping may have auto-deleted since the listing
            let Some(mut mapping) = self.client().lsfcmap(&map_id).await? else {
                continue;
            };
            // an in-progress copy onto this vdisk can be cut short when
            // the caller is about to delete the target anyway
            if allow_fctgt
                && mapping.target == *name
                && mapping.status == FcMapStatus::Copying
            {
                self.client().stopfcmap(&map_id, false).await?;
                if let Some(refreshed) = self.client().lsfcmap(&map_id).await? {
                    mapping = refreshed;
                }
            }
            if !mapping.copying() {
                if mapping.source == *name {
                    // zero-rate mappings out of this vdisk are snapshots:
                    // convert each into a real copy which auto-deletes on
                    // completion
                    if !allow_snaps {
                        return Err(SvcError::VdiskHasSnapshots {
                            vdisk: name.clone(),
                        });
                    }
                    self.client()
                        .chfcmap(&map_id, self.config().fc_copy_rate, true)
                        .await?;
                } else {
                    // this vdisk is the snapshot target
                    match mapping.status {
                        FcMapStatus::Copying | FcMapStatus::Prepared => {
                            self.client().stopfcmap(&map_id, false).await?;
                        }
                        FcMapStatus::Stopping | FcMapStatus::Preparing => {}
                        _ => self.client().rmfcmap(&map_id, true).await?,
                    }
                }
            } else {
                match mapping.status {
                    FcMapStatus::Prepared => {
                        self.client().stopfcmap(&map_id, true).await?;
                        self.client().rmfcmap(&map_id, true).await?;
                    }
                    FcMapStatus::IdleOrCopied | FcMapStatus::Stopped => {
                        self.client().rmfcmap(&map_id, true).await?;
                    }
                    // still copying: it finishes and auto-deletes
                    _ => {}
                }
            }
        }
        Ok(true)
    }
}
