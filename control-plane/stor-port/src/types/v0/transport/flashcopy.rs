use super::*;

use serde::{Deserialize, Serialize};

/// A point-in-time copy mapping between a source and a target vdisk, from
/// `lsfcmap`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct FlashCopyMapping {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Mapping name.
    pub name: String,
    /// Source vdisk name.
    pub source: VdiskName,
    /// Target vdisk name.
    pub target: VdiskName,
    /// Mapping status.
    pub status: FcMapStatus,
    /// Background copy progress, 0 to 100.
    pub progress: u32,
    /// Background copy rate; 0 means no background copy.
    pub copy_rate: u32,
    /// Whether the mapping deletes itself once the copy completes.
    pub autodelete: bool,
    /// The consistency group the mapping belongs to, when any.
    pub consist_group: Option<String>,
}

impl FlashCopyMapping {
    /// Whether this mapping copies in the background.
    pub fn copying(&self) -> bool {
        self.copy_rate > 0
    }
}

/// The state of a FlashCopy mapping as reported by the array.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum FcMapStatus {
    /// No copy in progress, or the copy has completed.
    #[default]
    IdleOrCopied,
    /// The target is being flushed ahead of a start.
    Preparing,
    /// Ready to be started.
    Prepared,
    /// Background copy in progress.
    Copying,
    /// Stop requested, flushing in-flight data.
    Stopping,
    /// Stopped; the target is not usable.
    Stopped,
    /// Suspended due to an I/O error.
    Suspended,
}

/// A transient grouping of FlashCopy mappings which transition together,
/// from `lsfcconsistgrp`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct FcConsistGrp {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Group name.
    pub name: String,
    /// Group status.
    pub status: FcConsistGrpStatus,
    /// Names of the member mappings.
    pub mappings: Vec<String>,
}

/// The state of a FlashCopy consistency group. Mirrors `FcMapStatus` with
/// an extra `Empty` state for a group with no members yet.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum FcConsistGrpStatus {
    /// No member mappings.
    #[default]
    Empty,
    /// No copy in progress, or the copy has completed.
    IdleOrCopied,
    /// The targets are being flushed ahead of a start.
    Preparing,
    /// Ready to be started.
    Prepared,
    /// Background copies in progress.
    Copying,
    /// Stop requested.
    Stopping,
    /// Stopped.
    Stopped,
    /// Suspended due to an I/O error.
    Suspended,
}
