use super::*;

use serde::{Deserialize, Serialize};

/// A logical volume on the array, from `lsvdisk`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct Vdisk {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Vdisk name.
    pub name: VdiskName,
    /// Unique identifier exposed on the SAN.
    pub uid: String,
    /// Virtual capacity in bytes.
    pub capacity: u64,
    /// Name of the owning I/O group.
    pub io_group: String,
    /// Name of the pool the first copy lives in.
    pub pool: PoolId,
    /// Vdisk status.
    pub status: VdiskStatus,
    /// Whether this vdisk is the target of a FlashCopy mapping.
    pub fc_map_count: u32,
    /// Name of the remote copy relationship, when mirrored.
    pub rc_name: Option<RelationshipName>,
    /// The mirrored extents backing this vdisk, one or two.
    pub copies: Vec<VdiskCopy>,
}

impl Vdisk {
    /// Get the primary copy, when the copy list is populated.
    pub fn primary_copy(&self) -> Option<&VdiskCopy> {
        self.copies.iter().find(|c| c.primary)
    }
}

/// Status of a vdisk.
#[derive(
    Serialize, Deserialize, Debug, Clone, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum VdiskStatus {
    /// Vdisk is online.
    Online,
    /// Vdisk is degraded.
    Degraded,
    /// Vdisk is offline.
    #[default]
    Offline,
}

/// One of up to two physical extents backing a vdisk, from `lsvdiskcopy`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct VdiskCopy {
    /// Copy id, "0" or "1".
    pub copy_id: String,
    /// Copy status.
    pub status: VdiskStatus,
    /// Whether the copy is synchronised with its sibling.
    pub sync: bool,
    /// Whether this copy serves reads.
    pub primary: bool,
    /// Pool the copy lives in.
    pub pool: PoolId,
    /// Whether EasyTier is enabled on the copy.
    pub easy_tier: bool,
    /// Whether the copy is compressed.
    pub compressed: bool,
}

/// Backend options for carving a vdisk, computed by the driver from the
/// volume type and its QoS spec.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VdiskOptions {
    /// Real capacity percentage for thin provisioning; `None` means a fully
    /// allocated (thick) vdisk.
    pub rsize: Option<u32>,
    /// Warning threshold as a percentage of virtual capacity.
    pub warning: u32,
    /// Whether the real capacity grows automatically.
    pub autoexpand: bool,
    /// Grain size in KB: 32, 64, 128 or 256.
    pub grainsize: u32,
    /// Whether the vdisk is compressed (requires the compression license).
    pub compressed: bool,
    /// Whether EasyTier is enabled.
    pub easytier: bool,
    /// The I/O group to place the vdisk in.
    pub iogrp: u32,
    /// Virtualisation I/O rate cap, in IOPS, from the QoS spec.
    pub iothrottling: Option<u64>,
    /// Replication mode requested by the volume type.
    pub replication: Option<ReplicationMode>,
}

impl Default for VdiskOptions {
    fn default() -> Self {
        Self {
            rsize: Some(2),
            warning: 0,
            autoexpand: true,
            grainsize: 256,
            compressed: false,
            easytier: true,
            iogrp: 0,
            iothrottling: None,
            replication: None,
        }
    }
}

impl VdiskOptions {
    /// Whether the options describe a thin-provisioned vdisk.
    pub fn thin(&self) -> bool {
        self.rsize.is_some()
    }
}
