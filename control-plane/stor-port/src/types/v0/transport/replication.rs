use super::*;

use serde::{Deserialize, Serialize};

/// The replication flavour of a mirror relationship.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum ReplicationMode {
    /// Asynchronous replication with unbounded lag.
    Global,
    /// Synchronous replication with bounded lag.
    Metro,
}

/// A mirrored pair of vdisks across two clusters, from `lsrcrelationship`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct RemoteCopyRelationship {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Relationship name.
    pub name: RelationshipName,
    /// Name of the master vdisk.
    pub master_vdisk: VdiskName,
    /// Name of the auxiliary vdisk.
    pub aux_vdisk: VdiskName,
    /// Name of the cluster holding the auxiliary vdisk.
    pub aux_cluster: ClusterId,
    /// Relationship state.
    pub state: RcState,
    /// Whether the master side currently acts as the primary.
    pub is_primary_master: bool,
    /// Whether this is a Global or Metro Mirror relationship.
    pub copy_type: ReplicationMode,
}

impl RemoteCopyRelationship {
    /// Whether the relationship may be failed back without data loss.
    pub fn synchronized(&self) -> bool {
        self.state.synchronized_family()
    }
}

/// The state of a remote copy relationship.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum RcState {
    /// Initial state before any synchronisation.
    #[default]
    InconsistentStopped,
    /// Initial background copy in progress.
    InconsistentCopying,
    /// Consistent but stopped; the aux holds a stale consistent image.
    ConsistentStopped,
    /// Consistent and resynchronising.
    ConsistentCopying,
    /// Fully synchronised.
    ConsistentSynchronized,
    /// Synchronised, reported by older code levels.
    Synchronized,
    /// Both sides writable, no copy in either direction.
    Idling,
    /// Idling and the partner cluster is unreachable.
    IdlingDisconnected,
    /// The partner cluster is unreachable.
    ConsistentDisconnected,
}

impl RcState {
    /// Whether the state belongs to the synchronised family, i.e. the two
    /// sides hold the same data and a failback is safe.
    pub fn synchronized_family(&self) -> bool {
        matches!(self, Self::ConsistentSynchronized | Self::Synchronized)
    }
}

/// A partnership with a remote cluster, from `lspartnership`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Partnership {
    /// Id of the remote cluster.
    pub id: ClusterId,
    /// Name of the remote cluster.
    pub name: String,
    /// Partnership state, e.g. `fully_configured`.
    pub state: PartnershipState,
    /// Whether this is an IP partnership, as opposed to Fibre Channel.
    pub ip_link: bool,
}

/// The state of a cluster partnership.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum PartnershipState {
    /// Partnership established in both directions.
    FullyConfigured,
    /// Partnership created locally only.
    #[default]
    PartiallyConfiguredLocal,
    /// Partnership created remotely only.
    PartiallyConfiguredLocalStopped,
    /// The remote cluster is not reachable.
    NotPresent,
}
