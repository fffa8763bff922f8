use super::*;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials used to authenticate against the array's administrative CLI.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct SshCredentials {
    /// User name on the array.
    pub username: String,
    /// Password, when password authentication is used.
    pub password: Option<String>,
    /// Path to a private key file, when key authentication is used.
    pub key_path: Option<String>,
}

/// Management access to the array: a primary address, an optional secondary
/// address to toggle to when the primary is unreachable, and session pool
/// sizing. Immutable after driver setup.
#[derive(Debug, Clone)]
pub struct ManagementEndpoint {
    /// Primary management address.
    pub primary_address: String,
    /// Secondary management address, used after a sticky failover.
    pub secondary_address: Option<String>,
    /// TCP port of the CLI.
    pub port: u16,
    /// CLI credentials.
    pub credentials: SshCredentials,
    /// Timeout for establishing one session.
    pub connect_timeout: Duration,
    /// Number of warm sessions kept in the pool.
    pub pool_min_size: usize,
    /// Bound on concurrent sessions, and so on in-flight CLI calls.
    pub pool_max_size: usize,
}

/// Identity and capability summary of the array, from `lssystem` and
/// `lslicense`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct ClusterInfo {
    /// Id of the system.
    pub id: ClusterId,
    /// Name of the system.
    pub name: String,
    /// Code level string, e.g. "7.8.1.0 (build 135.5.1234)".
    pub code_level: String,
    /// Whether the compression license is active.
    pub compression_enabled: bool,
}

/// State of a node canister, from `lsnode`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Node {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Node name.
    pub name: NodeId,
    /// Status, `online` or otherwise.
    pub status: NodeStatus,
    /// The I/O group this node belongs to.
    pub io_group: String,
    /// iSCSI qualified name, when configured.
    pub iscsi_name: Option<String>,
    /// WWPNs of the node ports.
    pub wwpns: Vec<String>,
}

impl Node {
    /// Check if the node is online.
    pub fn online(&self) -> bool {
        self.status == NodeStatus::Online
    }
}

/// Status of a node canister.
#[derive(
    Serialize, Deserialize, Debug, Clone, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    /// Node is online and serving I/O.
    Online,
    /// Node is offline.
    #[default]
    Offline,
    /// Node is being added to the cluster.
    Adding,
    /// Node is pending deletion.
    Deleting,
}

/// A pair of node canisters which jointly own a vdisk's paths, from
/// `lsiogrp`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct IoGroup {
    /// Numeric id, 0 to 3.
    pub id: u32,
    /// I/O group name.
    pub name: String,
    /// Number of nodes in the group.
    pub node_count: u32,
    /// Number of vdisks owned by the group.
    pub vdisk_count: u32,
}
