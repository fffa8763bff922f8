use super::*;

use serde::{Deserialize, Serialize};

/// State of a storage pool (mdisk group), from `lsmdiskgrp`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct Pool {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Pool name.
    pub name: PoolId,
    /// Pool status.
    pub status: PoolStatus,
    /// Total capacity in bytes.
    pub capacity: u64,
    /// Free capacity in bytes.
    pub free_capacity: u64,
    /// Sum of the virtual capacity of all vdisks in the pool, in bytes.
    pub virtual_capacity: u64,
    /// Capacity actually in use in bytes.
    pub used_capacity: u64,
    /// Whether EasyTier is active on the pool.
    pub easy_tier: bool,
    /// Number of vdisks carved out of the pool.
    pub vdisk_count: u32,
}

impl Pool {
    /// Check if the pool is online.
    pub fn online(&self) -> bool {
        self.status == PoolStatus::Online
    }
}

/// Status of a pool.
#[derive(
    Serialize, Deserialize, Debug, Clone, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum PoolStatus {
    /// Pool is online.
    Online,
    /// Pool is degraded but serving I/O.
    Degraded,
    /// Pool is offline.
    #[default]
    Offline,
}

/// Capacity and capability summary reported to the scheduler collaborator
/// for one pool.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Pool name.
    pub pool_name: PoolId,
    /// Total capacity in GiB.
    pub total_capacity_gb: f64,
    /// Free capacity in GiB.
    pub free_capacity_gb: f64,
    /// Virtual (provisioned) capacity in GiB.
    pub provisioned_capacity_gb: f64,
    /// Whether thin provisioning is supported.
    pub thin_provisioning_support: bool,
    /// Whether compression is supported (licensed and non-root pool).
    pub compression_support: bool,
    /// Whether EasyTier is active.
    pub easytier_support: bool,
    /// Whether the multi-attach host mapping is supported.
    pub multiattach: bool,
}
