use super::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A volume type as handed over by the volume-type/extra-specs lookup
/// collaborator: free-form extra specs plus an optional QoS spec.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VolumeTypeSpec {
    /// Name of the type.
    pub name: String,
    /// Backend extra specs, e.g. `rsize`, `compression`, `replication`.
    pub extra_specs: HashMap<String, String>,
    /// QoS spec, e.g. `IOThrottling`.
    pub qos: HashMap<String, String>,
}

/// A volume known to the driver: the manager-side identity plus the name of
/// the vdisk backing it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Volume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the backing vdisk.
    pub name: VdiskName,
    /// Size in bytes.
    pub size: u64,
    /// Volume status.
    pub status: VolumeStatus,
    /// Replication status.
    pub replication_status: ReplicationStatus,
}

/// Volume status, persisted by the caller through the model update.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VolumeStatus {
    /// The volume is usable.
    #[default]
    Available,
    /// The volume is attached to a host.
    InUse,
    /// The volume is unusable.
    Error,
}

/// Replication status, persisted by the caller through the model update.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ReplicationStatus {
    /// The volume is not replicated.
    #[default]
    Disabled,
    /// The volume is replicated to the target cluster.
    Enabled,
    /// The volume is served from the replication target.
    FailedOver,
    /// Replication needs operator attention.
    Error,
}

/// The subset of volume fields a driver call asks its caller to persist.
/// Only the populated fields change.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct VolumeUpdate {
    /// New volume status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VolumeStatus>,
    /// New replication status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_status: Option<ReplicationStatus>,
    /// New backing name when the volume is served from a different vdisk,
    /// e.g. after a failover.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id: Option<VolumeId>,
}

/// Create a volume.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateVolume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the vdisk to carve.
    pub name: VdiskName,
    /// Size in bytes.
    pub size: u64,
    /// Pool to carve the vdisk from.
    pub pool: PoolId,
    /// The volume type driving the backend options.
    pub type_spec: VolumeTypeSpec,
    /// Consistency group membership, when any.
    pub group: Option<GroupId>,
}

/// Destroy a volume.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DestroyVolume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the backing vdisk.
    pub name: VdiskName,
}

/// Extend a volume.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExtendVolume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the backing vdisk.
    pub name: VdiskName,
    /// Current size in bytes.
    pub size: u64,
    /// Requested size in bytes; must be larger than `size`.
    pub new_size: u64,
}

/// Create a point-in-time snapshot of a volume.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateSnapshot {
    /// UUID of the snapshot.
    pub uuid: SnapshotId,
    /// Name of the target vdisk to create.
    pub name: VdiskName,
    /// UUID of the source volume.
    pub source_uuid: VolumeId,
    /// Name of the source vdisk.
    pub source_name: VdiskName,
}

/// Destroy a snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DestroySnapshot {
    /// UUID of the snapshot.
    pub uuid: SnapshotId,
    /// Name of the backing target vdisk.
    pub name: VdiskName,
}

/// Create a volume out of an existing snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateVolumeFromSnapshot {
    /// The volume to create.
    pub volume: CreateVolume,
    /// Name of the source snapshot vdisk.
    pub snapshot_name: VdiskName,
    /// Size of the snapshot in bytes; the new volume must not be smaller.
    pub snapshot_size: u64,
}

/// Clone one volume into another.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CloneVolume {
    /// The volume to create.
    pub volume: CreateVolume,
    /// Name of the source vdisk.
    pub source_name: VdiskName,
    /// Size of the source volume in bytes.
    pub source_size: u64,
}

/// Move a volume to a different type, possibly in a different pool.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RetypeVolume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the backing vdisk.
    pub name: VdiskName,
    /// The current volume type.
    pub current_type: VolumeTypeSpec,
    /// The requested volume type.
    pub new_type: VolumeTypeSpec,
    /// The pool the volume lives in.
    pub current_pool: PoolId,
    /// The pool requested by the new type.
    pub new_pool: PoolId,
}

/// Migrate a volume to a different pool keeping its type.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MigrateVolume {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// Name of the backing vdisk.
    pub name: VdiskName,
    /// The destination pool.
    pub dest_pool: PoolId,
    /// The volume type driving the new copy's options.
    pub type_spec: VolumeTypeSpec,
}

/// Take over an existing vdisk as a managed volume.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ManageExistingVolume {
    /// UUID assigned to the managed volume.
    pub uuid: VolumeId,
    /// Name the vdisk will be renamed to.
    pub name: VdiskName,
    /// Name of the existing vdisk on the array.
    pub existing_name: VdiskName,
    /// The volume type the volume is managed under.
    pub type_spec: VolumeTypeSpec,
    /// The pool the volume is expected to live in.
    pub pool: PoolId,
}

/// One member of a group snapshot fan-out.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GroupSnapshotMember {
    /// UUID of the member snapshot.
    pub uuid: SnapshotId,
    /// Name of the target vdisk to create.
    pub name: VdiskName,
    /// Name of the member source vdisk.
    pub source_name: VdiskName,
}

/// Snapshot a consistency group atomically.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateGroupSnapshot {
    /// UUID of the group snapshot.
    pub uuid: GroupSnapshotId,
    /// UUID of the group.
    pub group: GroupId,
    /// The member snapshots to create.
    pub members: Vec<GroupSnapshotMember>,
}

/// One member of a group-from-source fan-out.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GroupCloneMember {
    /// The volume to create.
    pub volume: CreateVolume,
    /// Name of the source vdisk (a snapshot target or a group member).
    pub source_name: VdiskName,
}

/// Create a consistency group from a snapshot set or from another group.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateGroupFromSource {
    /// UUID of the new group.
    pub group: GroupId,
    /// The member volumes to create.
    pub members: Vec<GroupCloneMember>,
}

/// Fail the backend over to the replication target.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FailoverHost {
    /// The backend id of the replication target to fail over to.
    pub secondary_backend_id: ClusterId,
    /// The replicated volumes to fail over.
    pub volumes: Vec<Volume>,
}

/// Per-volume outcome of a failover or failback request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FailoverVolumeUpdate {
    /// UUID of the volume.
    pub uuid: VolumeId,
    /// The fields the caller must persist.
    pub update: VolumeUpdate,
}
