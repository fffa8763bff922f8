use super::*;

use serde::{Deserialize, Serialize};

/// A host object on the array, from `lshost`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct Host {
    /// Numeric id assigned by the array.
    pub id: String,
    /// Host name.
    pub name: HostName,
    /// WWPNs registered for the host. Repeated `WWPN` keys in the CLI
    /// output collapse into this list.
    pub wwpns: Vec<String>,
    /// iSCSI initiator names registered for the host.
    pub iscsi_names: Vec<String>,
}

/// The initiator ports of a connecting host, as handed over by the volume
/// manager on attach.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct Connector {
    /// Host name on the initiator side.
    pub host: String,
    /// Fibre Channel WWPNs.
    pub wwpns: Vec<String>,
    /// iSCSI initiator name.
    pub initiator: Option<String>,
}

/// Everything the initiator needs to reach a freshly mapped vdisk: the
/// mapping itself plus the target ports of the online nodes.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct ConnectionInfo {
    /// The host mapping carrying the SCSI LUN id.
    pub mapping: HostMapping,
    /// WWPNs of the online node ports.
    pub target_wwpns: Vec<String>,
    /// iSCSI qualified names of the online nodes.
    pub target_iqns: Vec<String>,
}

/// A host to vdisk mapping, from `lshostvdiskmap`.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct HostMapping {
    /// Host name.
    pub host: HostName,
    /// Mapped vdisk name.
    pub vdisk: VdiskName,
    /// SCSI LUN id presented to the host.
    pub scsi_id: u32,
}
