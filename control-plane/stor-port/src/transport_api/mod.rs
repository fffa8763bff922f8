//! Error machinery shared by every layer that talks to the array: the
//! resource taxonomy used in error reports and the error-chain formatter.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Report error chain.
pub trait ErrorChain {
    /// Full error chain as a string separated by ':'.
    fn full_string(&self) -> String;
}

impl<T> ErrorChain for T
where
    T: std::error::Error,
{
    /// Loops through the error chain and formats into a single string
    /// containing all the lower level errors.
    fn full_string(&self) -> String {
        let mut msg = format!("{self}");
        let mut opt_source = self.source();
        while let Some(source) = opt_source {
            msg = format!("{msg}: {source}");
            opt_source = source.source();
        }
        msg
    }
}

/// All the different variants of Resources.
#[derive(Serialize, Deserialize, Debug, Clone, AsRefStr, Display, Eq, PartialEq)]
pub enum ResourceKind {
    /// Unknown or unspecified resource.
    Unknown,
    /// Cluster resource.
    Cluster,
    /// Node resource.
    Node,
    /// I/O group resource.
    IoGroup,
    /// Pool resource.
    Pool,
    /// Vdisk resource.
    Vdisk,
    /// Vdisk mirror copy.
    VdiskCopy,
    /// Volume resource.
    Volume,
    /// Volume snapshot.
    Snapshot,
    /// FlashCopy mapping.
    FlashCopyMap,
    /// FlashCopy consistency group.
    FlashCopyGroup,
    /// Consistency group of volumes.
    Group,
    /// Group snapshot.
    GroupSnapshot,
    /// Host resource.
    Host,
    /// Host to vdisk mapping.
    HostMap,
    /// Remote copy relationship.
    RemoteCopy,
    /// Cluster partnership.
    Partnership,
}
