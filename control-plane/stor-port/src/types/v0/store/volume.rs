//! Encoding of the pending vdisk-copy operations persisted in a volume's
//! admin metadata, of the form `"<orig>:<new>;<orig>:<new>;..."`.

use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// One pending vdisk-copy operation: the copy to remove once the new copy
/// synchronises, and the new copy itself.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Hash)]
pub struct VdiskCopyOp {
    /// Id of the original copy, deleted once `new_copy_id` is in sync.
    pub orig_copy_id: String,
    /// Id of the copy added by the migrate/retype.
    pub new_copy_id: String,
}

impl VdiskCopyOp {
    /// Return a new `Self` for the given copy id pair.
    pub fn new(orig_copy_id: impl Into<String>, new_copy_id: impl Into<String>) -> Self {
        Self {
            orig_copy_id: orig_copy_id.into(),
            new_copy_id: new_copy_id.into(),
        }
    }
}

impl Display for VdiskCopyOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.orig_copy_id, self.new_copy_id)
    }
}

impl FromStr for VdiskCopyOp {
    type Err = String;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source.split_once(':') {
            Some((orig, new)) if !orig.is_empty() && !new.is_empty() => {
                Ok(Self::new(orig, new))
            }
            _ => Err(format!("Invalid vdisk copy op entry: '{source}'")),
        }
    }
}

/// The full set of pending copy operations of one volume, as persisted
/// under the `vdiskcopyops` metadata key.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct VdiskCopyOps(Vec<VdiskCopyOp>);

impl VdiskCopyOps {
    /// Return a new empty `Self`.
    pub fn new() -> Self {
        Self::default()
    }
    /// Get the tracked operations.
    pub fn ops(&self) -> &[VdiskCopyOp] {
        &self.0
    }
    /// Whether no operation is tracked.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Number of tracked operations.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Track a new operation.
    pub fn push(&mut self, op: VdiskCopyOp) {
        self.0.push(op);
    }
    /// Remove a tracked operation. Unknown operations are ignored.
    pub fn remove(&mut self, op: &VdiskCopyOp) {
        self.0.retain(|o| o != op);
    }
}

impl Display for VdiskCopyOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        write!(f, "{encoded}")
    }
}

impl FromStr for VdiskCopyOps {
    type Err = String;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        if source.is_empty() {
            return Ok(Self::new());
        }
        let ops = source
            .split(';')
            .map(VdiskCopyOp::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(ops))
    }
}
