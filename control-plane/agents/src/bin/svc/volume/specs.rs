//! Translation of a volume type's extra specs and QoS spec into the
//! backend options of a vdisk, with validation against the cluster's
//! actual capabilities.

use crate::controller::registry::Registry;
use agents::errors::SvcError;
use stor_port::types::v0::transport::{ReplicationMode, VdiskOptions, VolumeTypeSpec};

/// The grain sizes the array accepts for thin-provisioned vdisks.
const VALID_GRAIN_SIZES: &[u32] = &[32, 64, 128, 256];

fn invalid(option: &str, value: &str, reason: &str) -> SvcError {
    SvcError::InvalidOption {
        option: option.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(option: &str, value: &str) -> Result<bool, SvcError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "<is> true" | "yes" | "on" => Ok(true),
        "false" | "<is> false" | "no" | "off" => Ok(false),
        _ => Err(invalid(option, value, "expected a boolean")),
    }
}

/// Compute the vdisk options requested by a volume type, validating every
/// spec against the array's limits and licensed capabilities.
pub(crate) fn vdisk_options(
    registry: &Registry,
    type_spec: &VolumeTypeSpec,
) -> Result<VdiskOptions, SvcError> {
    let mut opts = VdiskOptions::default();
    for (key, value) in &type_spec.extra_specs {
        match key.as_str() {
            "rsize" => {
                let rsize: i64 = value
                    .parse()
                    .map_err(|_| invalid(key, value, "expected a percentage or -1"))?;
                opts.rsize = match rsize {
                    -1 => None,
                    1..=100 => Some(rsize as u32),
                    _ => return Err(invalid(key, value, "out of range, expected -1 or 1-100")),
                };
            }
            "warning" => {
                let warning: u32 = value
                    .parse()
                    .map_err(|_| invalid(key, value, "expected a percentage"))?;
                if warning > 100 {
                    return Err(invalid(key, value, "out of range, expected 0-100"));
                }
                opts.warning = warning;
            }
            "autoexpand" => opts.autoexpand = parse_bool(key, value)?,
            "grainsize" => {
                let grainsize: u32 = value
                    .parse()
                    .map_err(|_| invalid(key, value, "expected a grain size in KB"))?;
                if !VALID_GRAIN_SIZES.contains(&grainsize) {
                    return Err(invalid(key, value, "expected one of 32, 64, 128, 256"));
                }
                opts.grainsize = grainsize;
            }
            "compression" => opts.compressed = parse_bool(key, value)?,
            "easytier" => opts.easytier = parse_bool(key, value)?,
            "iogrp" => {
                opts.iogrp = value
                    .parse()
                    .map_err(|_| invalid(key, value, "expected an I/O group id"))?;
            }
            "replication" => {
                if parse_bool(key, value)? {
                    let target = registry
                        .config()
                        .replication_target
                        .as_ref()
                        .ok_or(SvcError::ReplicationNotConfigured {})?;
                    opts.replication = Some(target.mode);
                }
            }
            "replication_type" => {
                let mode: ReplicationMode = value
                    .parse()
                    .map_err(|_| invalid(key, value, "expected 'global' or 'metro'"))?;
                let target = registry
                    .config()
                    .replication_target
                    .as_ref()
                    .ok_or(SvcError::ReplicationNotConfigured {})?;
                if mode != target.mode {
                    return Err(invalid(
                        key,
                        value,
                        "does not match the replication mode of the configured target",
                    ));
                }
            }
            // unknown extra specs belong to other services and are ignored
            _ => {}
        }
    }

    if opts.compressed {
        if !registry.compression_enabled() {
            return Err(SvcError::CompressionNotLicensed {});
        }
        // a compressed vdisk is always space efficient
        if opts.rsize.is_none() {
            opts.rsize = VdiskOptions::default().rsize;
        }
    }
    if !registry.io_group_exists(opts.iogrp) {
        return Err(invalid(
            "iogrp",
            &opts.iogrp.to_string(),
            "no such I/O group on the cluster",
        ));
    }
    if let Some(throttle) = type_spec.qos.get("IOThrottling") {
        let rate: u64 = throttle
            .parse()
            .map_err(|_| invalid("IOThrottling", throttle, "expected an IOPS rate"))?;
        opts.iothrottling = Some(rate);
    }
    Ok(opts)
}

/// An attribute change which the array applies to an existing vdisk
/// without a new copy.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum InplaceChange {
    /// Move to another I/O group.
    IoGroup(u32),
    /// Flip EasyTier.
    EasyTier(bool),
    /// Change the warning threshold.
    Warning(u32),
    /// Flip autoexpand.
    Autoexpand(bool),
}

/// How a retype is realised: attribute changes applied in place, plus
/// whether the allocation layout forces a new mirrored copy.
#[derive(Debug, Default)]
pub(crate) struct RetypePlan {
    /// The new copy is unavoidable: pool move or an allocation option
    /// which cannot be altered on an existing copy.
    pub(crate) needs_copy: bool,
    /// Changes applied to the existing vdisk; these must never trigger a
    /// copy.
    pub(crate) inplace: Vec<InplaceChange>,
}

/// Decide how to move a vdisk from `old` to `new` options.
pub(crate) fn retype_plan(
    old: &VdiskOptions,
    new: &VdiskOptions,
    pool_changed: bool,
) -> RetypePlan {
    let mut plan = RetypePlan {
        needs_copy: pool_changed
            || old.rsize != new.rsize
            || old.compressed != new.compressed
            || (new.thin() && !new.compressed && old.grainsize != new.grainsize),
        ..Default::default()
    };
    if old.iogrp != new.iogrp {
        plan.inplace.push(InplaceChange::IoGroup(new.iogrp));
    }
    if old.easytier != new.easytier {
        plan.inplace.push(InplaceChange::EasyTier(new.easytier));
    }
    if old.warning != new.warning && new.thin() {
        plan.inplace.push(InplaceChange::Warning(new.warning));
    }
    if old.autoexpand != new.autoexpand && new.thin() {
        plan.inplace.push(InplaceChange::Autoexpand(new.autoexpand));
    }
    plan
}
