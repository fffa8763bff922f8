//! Typed wrappers over the array CLI, one method per verb. The wrappers
//! own the argument quoting rules and decode the expected success markers
//! or error codes; callers never see raw CLI text.

use super::{parser::CliRecord, parser::CliResponse, CliExecutor, CommandOutput};
use agents::errors::SvcError;
use itertools::Itertools;
use std::sync::Arc;
use stor_port::types::v0::transport::*;

/// The error code the CLI reports for a missing object. Probing verbs map
/// it to an absence instead of an error.
const OBJ_NOT_FOUND: &str = "CMMVC5754E";

/// Typed client for the array CLI.
#[derive(Clone)]
pub(crate) struct CliClient {
    executor: Arc<dyn CliExecutor>,
    delim: char,
}

impl CliClient {
    /// Return a new `Self` over the given executor.
    pub(crate) fn new(executor: Arc<dyn CliExecutor>, delim: char) -> Self {
        Self { executor, delim }
    }

    /// Wrap a name in the literal quotes understood by the remote CLI's
    /// own tokenizer. Distinct from shell quoting.
    fn quote(name: &str) -> String {
        format!("\"{name}\"")
    }

    /// Run an informational verb and parse its output. The delimiter is
    /// requested right after the verb: `svcinfo <verb> -delim ! ...`.
    async fn info(&self, mut argv: Vec<String>, with_header: bool) -> Result<CliResponse, SvcError> {
        argv.insert(2, "-delim".to_string());
        argv.insert(3, self.delim.to_string());
        let command = argv.iter().join(" ");
        let output = self.executor.execute(&argv, true).await?;
        CliResponse::parse(&command, &output.stdout, self.delim, with_header)
    }

    /// Run an informational verb tolerating the "no such object" error
    /// code: absence parses to `None`, anything else nonzero is a hard
    /// backend error.
    async fn info_probe(
        &self,
        mut argv: Vec<String>,
        with_header: bool,
    ) -> Result<Option<CliResponse>, SvcError> {
        argv.insert(2, "-delim".to_string());
        argv.insert(3, self.delim.to_string());
        let command = argv.iter().join(" ");
        let output = self.executor.execute(&argv, false).await?;
        if !output.success() {
            if output.stderr.contains(OBJ_NOT_FOUND) {
                return Ok(None);
            }
            return Err(SvcError::CliCommandFailed {
                command,
                exit_status: output.exit_status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        let response = CliResponse::parse(&command, &output.stdout, self.delim, with_header)?;
        Ok(Some(response))
    }

    /// Run a task verb, expecting success.
    async fn task(&self, argv: Vec<String>) -> Result<CommandOutput, SvcError> {
        self.executor.execute(&argv, true).await
    }

    /// Run a task verb which must not produce any output on success.
    async fn task_assert_no_output(&self, argv: Vec<String>) -> Result<(), SvcError> {
        let output = self.task(argv.clone()).await?;
        if !output.stdout.trim().is_empty() {
            return Err(SvcError::CliUnexpectedOutput {
                command: argv.iter().join(" "),
                output: output.stdout,
            });
        }
        Ok(())
    }

    /// Run a create verb and extract the object id embedded in the success
    /// message, e.g. "Virtual Disk, id [4], successfully created". An
    /// absent pattern is a protocol-level failure.
    async fn task_created_id(&self, argv: Vec<String>) -> Result<String, SvcError> {
        let command = argv.iter().join(" ");
        let output = self.task(argv).await?;
        extract_bracketed(&output.stdout, false).ok_or(SvcError::MissingSuccessId {
            command,
            output: output.stdout,
        })
    }

    // ===== system topology =====

    /// Identity of the array, from `lssystem`.
    pub(crate) async fn lssystem(&self) -> Result<ClusterInfo, SvcError> {
        let argv = svcinfo(["lssystem"]);
        let response = self.info(argv, false).await?;
        let record = response.first()?;
        Ok(ClusterInfo {
            id: ClusterId::from(record.get("id")?),
            name: record.get("name")?.to_string(),
            code_level: record.get("code_level")?.to_string(),
            compression_enabled: false,
        })
    }

    /// Whether the compression license is active, from `lslicense`.
    pub(crate) async fn lslicense_compression(&self) -> Result<bool, SvcError> {
        let argv = svcinfo(["lslicense"]);
        let response = self.info(argv, false).await?;
        let record = response.first()?;
        let enclosures = record
            .get_opt("license_compression_enclosures")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        let capacity = record
            .get_opt("license_compression_capacity")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(enclosures > 0 || capacity > 0)
    }

    /// The node canisters, from `lsnode`.
    pub(crate) async fn lsnode(&self) -> Result<Vec<Node>, SvcError> {
        let argv = svcinfo(["lsnode"]);
        let response = self.info(argv, true).await?;
        response.records().iter().map(node_from_record).collect()
    }

    /// One node with its SAN ports, from the `lsnode` detail view.
    pub(crate) async fn lsnode_detail(&self, name: &NodeId) -> Result<Node, SvcError> {
        let argv = svcinfo(["lsnode", &Self::quote(name.as_str())]);
        let response = self.info(argv, false).await?;
        let record = response.first()?;
        let mut node = node_from_record(record)?;
        node.wwpns = record.get_all("port_id").iter().map(ToString::to_string).collect();
        Ok(node)
    }

    /// The I/O groups, from `lsiogrp`.
    pub(crate) async fn lsiogrp(&self) -> Result<Vec<IoGroup>, SvcError> {
        let argv = svcinfo(["lsiogrp"]);
        let response = self.info(argv, true).await?;
        response
            .records()
            .iter()
            .map(|record| {
                Ok(IoGroup {
                    id: record.get_u32("id")?,
                    name: record.get("name")?.to_string(),
                    node_count: record.get_u32("node_count")?,
                    vdisk_count: record.get_u32("vdisk_count")?,
                })
            })
            .collect()
    }

    /// The storage pools, from `lsmdiskgrp`.
    pub(crate) async fn lsmdiskgrp(&self) -> Result<Vec<Pool>, SvcError> {
        let argv = svcinfo(["lsmdiskgrp", "-bytes"]);
        let response = self.info(argv, true).await?;
        response.records().iter().map(pool_from_record).collect()
    }

    /// One pool, from the `lsmdiskgrp` detail view. Absence is `None`.
    pub(crate) async fn lsmdiskgrp_named(&self, pool: &PoolId) -> Result<Option<Pool>, SvcError> {
        let argv = svcinfo(["lsmdiskgrp", "-bytes", &Self::quote(pool.as_str())]);
        match self.info_probe(argv, false).await? {
            Some(response) => Ok(Some(pool_from_record(response.first()?)?)),
            None => Ok(None),
        }
    }

    // ===== vdisks =====

    /// Carve a vdisk, returning its id.
    pub(crate) async fn mkvdisk(
        &self,
        name: &VdiskName,
        pool: &PoolId,
        size_bytes: u64,
        opts: &VdiskOptions,
    ) -> Result<String, SvcError> {
        let mut argv = svctask([
            "mkvdisk",
            "-name",
            &Self::quote(name.as_str()),
            "-iogrp",
            &opts.iogrp.to_string(),
            "-mdiskgrp",
            &Self::quote(pool.as_str()),
            "-size",
            &size_bytes.to_string(),
            "-unit",
            "b",
            "-easytier",
            on_off(opts.easytier),
        ]);
        argv.extend(space_efficiency_args(opts));
        self.task_created_id(argv).await
    }

    /// Delete a vdisk.
    pub(crate) async fn rmvdisk(&self, name: &VdiskName, force: bool) -> Result<(), SvcError> {
        let mut argv = svctask(["rmvdisk"]);
        if force {
            argv.push("-force".to_string());
        }
        argv.push(Self::quote(name.as_str()));
        self.task_assert_no_output(argv).await
    }

    /// Rename a vdisk.
    pub(crate) async fn rename_vdisk(
        &self,
        name: &VdiskName,
        new_name: &VdiskName,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "chvdisk",
            "-name",
            &Self::quote(new_name.as_str()),
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Grow a vdisk by `delta_bytes`.
    pub(crate) async fn expandvdisksize(
        &self,
        name: &VdiskName,
        delta_bytes: u64,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "expandvdisksize",
            "-size",
            &delta_bytes.to_string(),
            "-unit",
            "b",
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Move a vdisk to another I/O group, keeping it online.
    pub(crate) async fn movevdisk(&self, name: &VdiskName, iogrp: u32) -> Result<(), SvcError> {
        let argv = svctask([
            "movevdisk",
            "-iogrp",
            &iogrp.to_string(),
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Cap the virtualisation I/O rate of a vdisk.
    pub(crate) async fn chvdisk_rate(&self, name: &VdiskName, rate: u64) -> Result<(), SvcError> {
        let argv = svctask([
            "chvdisk",
            "-rate",
            &rate.to_string(),
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Flip EasyTier on a vdisk in place.
    pub(crate) async fn chvdisk_easytier(&self, name: &VdiskName, on: bool) -> Result<(), SvcError> {
        let argv = svctask(["chvdisk", "-easytier", on_off(on), &Self::quote(name.as_str())]);
        self.task_assert_no_output(argv).await
    }

    /// Change the warning threshold of a vdisk in place.
    pub(crate) async fn chvdisk_warning(&self, name: &VdiskName, warning: u32) -> Result<(), SvcError> {
        let argv = svctask([
            "chvdisk",
            "-warning",
            &format!("{warning}%"),
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Flip autoexpand on a vdisk in place.
    pub(crate) async fn chvdisk_autoexpand(
        &self,
        name: &VdiskName,
        on: bool,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "chvdisk",
            "-autoexpand",
            on_off(on),
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Make the given copy the primary, flipping reads over atomically.
    pub(crate) async fn chvdisk_primary(
        &self,
        name: &VdiskName,
        copy_id: &str,
    ) -> Result<(), SvcError> {
        let argv = svctask(["chvdisk", "-primary", copy_id, &Self::quote(name.as_str())]);
        self.task_assert_no_output(argv).await
    }

    /// One vdisk with its copies, from the `lsvdisk` detail view. The
    /// detail output is one vdisk-level block followed by one block per
    /// copy. Absence is `None`, not an error: callers routinely probe.
    pub(crate) async fn lsvdisk(&self, name: &VdiskName) -> Result<Option<Vdisk>, SvcError> {
        let argv = svcinfo(["lsvdisk", "-bytes", &Self::quote(name.as_str())]);
        let response = match self.info_probe(argv, false).await? {
            Some(response) => response,
            None => return Ok(None),
        };
        let record = response.first()?;
        let mut vdisk = Vdisk {
            id: record.get("id")?.to_string(),
            name: VdiskName::from(record.get("name")?),
            uid: record.get("vdisk_UID")?.to_string(),
            capacity: record.get_u64("capacity")?,
            io_group: record.get("IO_group_name")?.to_string(),
            pool: PoolId::from(record.get("mdisk_grp_name")?),
            status: record.get_enum("status")?,
            fc_map_count: record.get_u32("fc_map_count")?,
            rc_name: record.get_opt("RC_name").map(RelationshipName::from),
            copies: vec![],
        };
        for copy_record in response.records().iter().skip(1) {
            vdisk.copies.push(vdisk_copy_from_record(copy_record)?);
        }
        Ok(Some(vdisk))
    }

    /// The mirrored copies of a vdisk, from `lsvdiskcopy`.
    pub(crate) async fn lsvdiskcopy(&self, name: &VdiskName) -> Result<Vec<VdiskCopy>, SvcError> {
        let argv = svcinfo(["lsvdiskcopy", &Self::quote(name.as_str())]);
        let response = self.info(argv, true).await?;
        response.records().iter().map(vdisk_copy_from_record).collect()
    }

    /// Synchronisation progress of one copy, from `lsvdisksyncprogress`.
    pub(crate) async fn lsvdisksyncprogress(
        &self,
        name: &VdiskName,
        copy_id: &str,
    ) -> Result<u32, SvcError> {
        let argv = svcinfo([
            "lsvdisksyncprogress",
            "-copy",
            copy_id,
            &Self::quote(name.as_str()),
        ]);
        let response = self.info(argv, true).await?;
        response.first()?.get_u32("progress")
    }

    /// Add a mirrored copy to a vdisk, returning the new copy id. The
    /// success message names both ids: "Vdisk [4] copy [1] successfully
    /// created" - the copy id is the trailing one.
    pub(crate) async fn addvdiskcopy(
        &self,
        name: &VdiskName,
        pool: &PoolId,
        opts: &VdiskOptions,
    ) -> Result<String, SvcError> {
        let mut argv = svctask([
            "addvdiskcopy",
            "-mdiskgrp",
            &Self::quote(pool.as_str()),
            "-easytier",
            on_off(opts.easytier),
        ]);
        argv.extend(space_efficiency_args(opts));
        argv.push(Self::quote(name.as_str()));
        let command = argv.iter().join(" ");
        let output = self.task(argv).await?;
        extract_bracketed(&output.stdout, true).ok_or(SvcError::MissingSuccessId {
            command,
            output: output.stdout,
        })
    }

    /// Remove one mirrored copy of a vdisk.
    pub(crate) async fn rmvdiskcopy(&self, name: &VdiskName, copy_id: &str) -> Result<(), SvcError> {
        let argv = svctask(["rmvdiskcopy", "-copy", copy_id, &Self::quote(name.as_str())]);
        self.task_assert_no_output(argv).await
    }

    // ===== FlashCopy mappings =====

    /// Create a FlashCopy mapping, returning its id.
    pub(crate) async fn mkfcmap(
        &self,
        source: &VdiskName,
        target: &VdiskName,
        copy_rate: u32,
        autodelete: bool,
        consist_group: Option<&str>,
    ) -> Result<String, SvcError> {
        let mut argv = svctask([
            "mkfcmap",
            "-source",
            &Self::quote(source.as_str()),
            "-target",
            &Self::quote(target.as_str()),
            "-copyrate",
            &copy_rate.to_string(),
        ]);
        if autodelete {
            argv.push("-autodelete".to_string());
        }
        if let Some(group) = consist_group {
            argv.push("-consistgrp".to_string());
            argv.push(Self::quote(group));
        }
        self.task_created_id(argv).await
    }

    /// Change the copy rate (and autodelete) of an existing mapping, used
    /// to turn a zero-rate snapshot mapping into a real background copy.
    pub(crate) async fn chfcmap(
        &self,
        map_id: &str,
        copy_rate: u32,
        autodelete: bool,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "chfcmap",
            "-copyrate",
            &copy_rate.to_string(),
            "-autodelete",
            on_off(autodelete),
            map_id,
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Flush the target ahead of a start.
    pub(crate) async fn prestartfcmap(&self, map_id: &str) -> Result<(), SvcError> {
        let argv = svctask(["prestartfcmap", map_id]);
        self.task_assert_no_output(argv).await
    }

    /// Start a prepared mapping.
    pub(crate) async fn startfcmap(&self, map_id: &str) -> Result<(), SvcError> {
        let argv = svctask(["startfcmap", map_id]);
        self.task_assert_no_output(argv).await
    }

    /// Stop a mapping.
    pub(crate) async fn stopfcmap(&self, map_id: &str, force: bool) -> Result<(), SvcError> {
        let mut argv = svctask(["stopfcmap"]);
        if force {
            argv.push("-force".to_string());
        }
        argv.push(map_id.to_string());
        self.task_assert_no_output(argv).await
    }

    /// Delete a mapping.
    pub(crate) async fn rmfcmap(&self, map_id: &str, force: bool) -> Result<(), SvcError> {
        let mut argv = svctask(["rmfcmap"]);
        if force {
            argv.push("-force".to_string());
        }
        argv.push(map_id.to_string());
        self.task_assert_no_output(argv).await
    }

    /// One mapping by id. Absence is `None`.
    pub(crate) async fn lsfcmap(&self, map_id: &str) -> Result<Option<FlashCopyMapping>, SvcError> {
        let argv = svcinfo(["lsfcmap", "-filtervalue", &format!("id={map_id}")]);
        let response = self.info(argv, true).await?;
        match response.records().first() {
            Some(record) => Ok(Some(fcmap_from_record(record)?)),
            None => Ok(None),
        }
    }

    /// The ids of every mapping referencing a vdisk, as source or target,
    /// from `lsvdiskfcmappings`.
    pub(crate) async fn lsvdiskfcmappings(&self, name: &VdiskName) -> Result<Vec<String>, SvcError> {
        let argv = svcinfo(["lsvdiskfcmappings", &Self::quote(name.as_str())]);
        let response = self.info(argv, true).await?;
        response
            .select(&["id"])
            .map_ok(|fields| fields[0].to_string())
            .collect()
    }

    // ===== FlashCopy consistency groups =====

    /// Create a FlashCopy consistency group, returning its id.
    pub(crate) async fn mkfcconsistgrp(&self, name: &str) -> Result<String, SvcError> {
        let argv = svctask(["mkfcconsistgrp", "-name", &Self::quote(name)]);
        self.task_created_id(argv).await
    }

    /// Flush all member targets ahead of a group start.
    pub(crate) async fn prestartfcconsistgrp(&self, name: &str) -> Result<(), SvcError> {
        let argv = svctask(["prestartfcconsistgrp", &Self::quote(name)]);
        self.task_assert_no_output(argv).await
    }

    /// Start a prepared group atomically.
    pub(crate) async fn startfcconsistgrp(&self, name: &str) -> Result<(), SvcError> {
        let argv = svctask(["startfcconsistgrp", &Self::quote(name)]);
        self.task_assert_no_output(argv).await
    }

    /// Stop a group.
    pub(crate) async fn stopfcconsistgrp(&self, name: &str) -> Result<(), SvcError> {
        let argv = svctask(["stopfcconsistgrp", &Self::quote(name)]);
        self.task_assert_no_output(argv).await
    }

    /// Delete a group.
    pub(crate) async fn rmfcconsistgrp(&self, name: &str, force: bool) -> Result<(), SvcError> {
        let mut argv = svctask(["rmfcconsistgrp"]);
        if force {
            argv.push("-force".to_string());
        }
        argv.push(Self::quote(name));
        self.task_assert_no_output(argv).await
    }

    /// One group with its member mappings, from the detail view. Absence
    /// is `None`.
    pub(crate) async fn lsfcconsistgrp(&self, name: &str) -> Result<Option<FcConsistGrp>, SvcError> {
        let argv = svcinfo(["lsfcconsistgrp", &Self::quote(name)]);
        let response = match self.info_probe(argv, false).await? {
            Some(response) => response,
            None => return Ok(None),
        };
        let record = response.first()?;
        Ok(Some(FcConsistGrp {
            id: record.get("id")?.to_string(),
            name: record.get("name")?.to_string(),
            status: record.get_enum("status")?,
            mappings: record
                .get_all("FC_mapping_id")
                .iter()
                .map(ToString::to_string)
                .collect(),
        }))
    }

    // ===== remote copy =====

    /// Create a mirror relationship, returning its id.
    pub(crate) async fn mkrcrelationship(
        &self,
        name: &RelationshipName,
        master: &VdiskName,
        aux: &VdiskName,
        aux_cluster: &ClusterId,
        mode: ReplicationMode,
    ) -> Result<String, SvcError> {
        let mut argv = svctask([
            "mkrcrelationship",
            "-name",
            &Self::quote(name.as_str()),
            "-master",
            &Self::quote(master.as_str()),
            "-aux",
            &Self::quote(aux.as_str()),
            "-cluster",
            aux_cluster.as_str(),
        ]);
        if mode == ReplicationMode::Global {
            argv.push("-global".to_string());
        }
        self.task_created_id(argv).await
    }

    /// Start (or restart) copying on a relationship. `primary` names the
    /// side to copy from when restarting out of an idling state.
    pub(crate) async fn startrcrelationship(
        &self,
        name: &RelationshipName,
        primary: Option<&str>,
    ) -> Result<(), SvcError> {
        let mut argv = svctask(["startrcrelationship"]);
        if let Some(primary) = primary {
            argv.push("-primary".to_string());
            argv.push(primary.to_string());
            argv.push("-force".to_string());
        }
        argv.push(Self::quote(name.as_str()));
        self.task_assert_no_output(argv).await
    }

    /// Stop copying; with `access` the auxiliary side becomes writable,
    /// which is the disaster-recovery entry point.
    pub(crate) async fn stoprcrelationship(
        &self,
        name: &RelationshipName,
        access: bool,
    ) -> Result<(), SvcError> {
        let mut argv = svctask(["stoprcrelationship"]);
        if access {
            argv.push("-access".to_string());
        }
        argv.push(Self::quote(name.as_str()));
        self.task_assert_no_output(argv).await
    }

    /// Reverse the copy direction of a consistent relationship.
    pub(crate) async fn switchrcrelationship(
        &self,
        name: &RelationshipName,
        primary_master: bool,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "switchrcrelationship",
            "-primary",
            if primary_master { "master" } else { "aux" },
            &Self::quote(name.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Delete a relationship.
    pub(crate) async fn rmrcrelationship(
        &self,
        name: &RelationshipName,
        force: bool,
    ) -> Result<(), SvcError> {
        let mut argv = svctask(["rmrcrelationship"]);
        if force {
            argv.push("-force".to_string());
        }
        argv.push(Self::quote(name.as_str()));
        self.task_assert_no_output(argv).await
    }

    /// One relationship, from the detail view. Absence is `None`.
    pub(crate) async fn lsrcrelationship(
        &self,
        name: &RelationshipName,
    ) -> Result<Option<RemoteCopyRelationship>, SvcError> {
        let argv = svcinfo(["lsrcrelationship", &Self::quote(name.as_str())]);
        let response = match self.info_probe(argv, false).await? {
            Some(response) => response,
            None => return Ok(None),
        };
        let record = response.first()?;
        Ok(Some(RemoteCopyRelationship {
            id: record.get("id")?.to_string(),
            name: RelationshipName::from(record.get("name")?),
            master_vdisk: VdiskName::from(record.get("master_vdisk_name")?),
            aux_vdisk: VdiskName::from(record.get("aux_vdisk_name")?),
            aux_cluster: ClusterId::from(record.get("aux_cluster_name")?),
            state: record.get_enum("state")?,
            is_primary_master: record.get("primary")? == "master",
            copy_type: record.get_enum("copy_type")?,
        }))
    }

    /// The configured partnerships, from `lspartnership`.
    pub(crate) async fn lspartnership(&self) -> Result<Vec<Partnership>, SvcError> {
        let argv = svcinfo(["lspartnership"]);
        let response = self.info(argv, true).await?;
        response
            .records()
            .iter()
            .filter(|record| record.get_opt("location") != Some("local"))
            .map(|record| {
                Ok(Partnership {
                    id: ClusterId::from(record.get("id")?),
                    name: record.get("name")?.to_string(),
                    state: record.get_enum("partnership")?,
                    ip_link: record.get_opt("type") == Some("ipv4"),
                })
            })
            .collect()
    }

    /// Clusters visible on the fabric which could become partners.
    pub(crate) async fn lspartnershipcandidate(&self) -> Result<Vec<(ClusterId, String)>, SvcError> {
        let argv = svcinfo(["lspartnershipcandidate"]);
        let response = self.info(argv, true).await?;
        response
            .select(&["id", "name"])
            .map_ok(|fields| (ClusterId::from(fields[0]), fields[1].to_string()))
            .collect()
    }

    /// Establish an IP partnership towards the given address.
    pub(crate) async fn mkippartnership(
        &self,
        remote_ip: &str,
        bandwidth_mbps: u32,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "mkippartnership",
            "-type",
            "ipv4",
            "-clusterip",
            remote_ip,
            "-linkbandwidthmbits",
            &bandwidth_mbps.to_string(),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Establish a Fibre Channel partnership towards the given cluster.
    pub(crate) async fn mkfcpartnership(
        &self,
        remote_cluster: &str,
        bandwidth_mbps: u32,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "mkfcpartnership",
            "-linkbandwidthmbits",
            &bandwidth_mbps.to_string(),
            &Self::quote(remote_cluster),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// (Re)start a partnership.
    pub(crate) async fn chpartnership_start(&self, cluster_id: &ClusterId) -> Result<(), SvcError> {
        let argv = svctask(["chpartnership", "-start", cluster_id.as_str()]);
        self.task_assert_no_output(argv).await
    }

    // ===== hosts =====

    /// Create a host object seeded with one FC port, returning its id.
    pub(crate) async fn mkhost_wwpn(&self, name: &HostName, wwpn: &str) -> Result<String, SvcError> {
        let argv = svctask([
            "mkhost",
            "-name",
            &Self::quote(name.as_str()),
            "-hbawwpn",
            wwpn,
            "-force",
        ]);
        self.task_created_id(argv).await
    }

    /// Create a host object seeded with one iSCSI initiator, returning its
    /// id.
    pub(crate) async fn mkhost_iscsi(
        &self,
        name: &HostName,
        initiator: &str,
    ) -> Result<String, SvcError> {
        let argv = svctask([
            "mkhost",
            "-name",
            &Self::quote(name.as_str()),
            "-iscsiname",
            initiator,
            "-force",
        ]);
        self.task_created_id(argv).await
    }

    /// Register another FC port on an existing host.
    pub(crate) async fn addhostport_wwpn(&self, host: &HostName, wwpn: &str) -> Result<(), SvcError> {
        let argv = svctask([
            "addhostport",
            "-hbawwpn",
            wwpn,
            "-force",
            &Self::quote(host.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Register another iSCSI initiator on an existing host.
    pub(crate) async fn addhostport_iscsi(
        &self,
        host: &HostName,
        initiator: &str,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "addhostport",
            "-iscsiname",
            initiator,
            "-force",
            &Self::quote(host.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// Delete a host object.
    pub(crate) async fn rmhost(&self, host: &HostName) -> Result<(), SvcError> {
        let argv = svctask(["rmhost", &Self::quote(host.as_str())]);
        self.task_assert_no_output(argv).await
    }

    /// All host objects, from `lshost`.
    pub(crate) async fn lshost(&self) -> Result<Vec<(String, HostName)>, SvcError> {
        let argv = svcinfo(["lshost"]);
        let response = self.info(argv, true).await?;
        response
            .select(&["id", "name"])
            .map_ok(|fields| (fields[0].to_string(), HostName::from(fields[1])))
            .collect()
    }

    /// One host with its registered ports, from the detail view. Absence
    /// is `None`.
    pub(crate) async fn lshost_detail(&self, name: &HostName) -> Result<Option<Host>, SvcError> {
        let argv = svcinfo(["lshost", &Self::quote(name.as_str())]);
        let response = match self.info_probe(argv, false).await? {
            Some(response) => response,
            None => return Ok(None),
        };
        let record = response.first()?;
        Ok(Some(Host {
            id: record.get("id")?.to_string(),
            name: HostName::from(record.get("name")?),
            wwpns: record.get_all("WWPN").iter().map(ToString::to_string).collect(),
            iscsi_names: record
                .get_all("iscsi_name")
                .iter()
                .map(ToString::to_string)
                .collect(),
        }))
    }

    /// Map a vdisk to a host, returning the mapping id.
    pub(crate) async fn mkvdiskhostmap(
        &self,
        host: &HostName,
        vdisk: &VdiskName,
        scsi_id: Option<u32>,
    ) -> Result<String, SvcError> {
        let mut argv = svctask(["mkvdiskhostmap", "-host", &Self::quote(host.as_str())]);
        if let Some(scsi_id) = scsi_id {
            argv.push("-scsi".to_string());
            argv.push(scsi_id.to_string());
        }
        argv.push(Self::quote(vdisk.as_str()));
        self.task_created_id(argv).await
    }

    /// Unmap a vdisk from a host.
    pub(crate) async fn rmvdiskhostmap(
        &self,
        host: &HostName,
        vdisk: &VdiskName,
    ) -> Result<(), SvcError> {
        let argv = svctask([
            "rmvdiskhostmap",
            "-host",
            &Self::quote(host.as_str()),
            &Self::quote(vdisk.as_str()),
        ]);
        self.task_assert_no_output(argv).await
    }

    /// All vdisks mapped to a host.
    pub(crate) async fn lshostvdiskmap(&self, host: &HostName) -> Result<Vec<HostMapping>, SvcError> {
        let argv = svcinfo(["lshostvdiskmap", &Self::quote(host.as_str())]);
        let response = self.info(argv, true).await?;
        response
            .records()
            .iter()
            .map(|record| {
                Ok(HostMapping {
                    host: HostName::from(record.get("name")?),
                    vdisk: VdiskName::from(record.get("vdisk_name")?),
                    scsi_id: record.get_u32("SCSI_id")?,
                })
            })
            .collect()
    }

    /// All hosts a vdisk is mapped to.
    pub(crate) async fn lsvdiskhostmap(&self, vdisk: &VdiskName) -> Result<Vec<HostMapping>, SvcError> {
        let argv = svcinfo(["lsvdiskhostmap", &Self::quote(vdisk.as_str())]);
        let response = self.info(argv, true).await?;
        response
            .records()
            .iter()
            .map(|record| {
                Ok(HostMapping {
                    host: HostName::from(record.get("host_name")?),
                    vdisk: VdiskName::from(record.get("name")?),
                    scsi_id: record.get_u32("SCSI_id")?,
                })
            })
            .collect()
    }
}

/// Assemble an informational command line.
fn svcinfo<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    std::iter::once("svcinfo")
        .chain(parts)
        .map(ToString::to_string)
        .collect()
}

/// Assemble a task command line.
fn svctask<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    std::iter::once("svctask")
        .chain(parts)
        .map(ToString::to_string)
        .collect()
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// The thin-provisioning/compression argument block shared by `mkvdisk`
/// and `addvdiskcopy`. A thick vdisk adds nothing.
fn space_efficiency_args(opts: &VdiskOptions) -> Vec<String> {
    let mut argv = vec![];
    if let Some(rsize) = opts.rsize {
        argv.push("-rsize".to_string());
        argv.push(format!("{rsize}%"));
        if opts.autoexpand {
            argv.push("-autoexpand".to_string());
        }
        argv.push("-warning".to_string());
        argv.push(format!("{}%", opts.warning));
        if opts.compressed {
            argv.push("-compressed".to_string());
        } else {
            argv.push("-grainsize".to_string());
            argv.push(opts.grainsize.to_string());
        }
    }
    argv
}

/// Extract the id embedded in a create-verb success message. The message
/// must carry the "successfully created" marker; `trailing` selects the
/// last bracketed token instead of the first (the `addvdiskcopy` shape).
fn extract_bracketed(output: &str, trailing: bool) -> Option<String> {
    if !output.contains("successfully created") {
        return None;
    }
    let open = if trailing {
        output.rfind('[')?
    } else {
        output.find('[')?
    };
    let close = output[open..].find(']')? + open;
    let id = output[open + 1..close].trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn node_from_record(record: &CliRecord) -> Result<Node, SvcError> {
    Ok(Node {
        id: record.get("id")?.to_string(),
        name: NodeId::from(record.get("name")?),
        status: record.get_enum("status")?,
        io_group: record.get("IO_group_name")?.to_string(),
        iscsi_name: record.get_opt("iscsi_name").map(ToString::to_string),
        wwpns: vec![],
    })
}

fn pool_from_record(record: &CliRecord) -> Result<Pool, SvcError> {
    Ok(Pool {
        id: record.get("id")?.to_string(),
        name: PoolId::from(record.get("name")?),
        status: record.get_enum("status")?,
        capacity: record.get_u64("capacity")?,
        free_capacity: record.get_u64("free_capacity")?,
        virtual_capacity: record.get_u64("virtual_capacity")?,
        used_capacity: record.get_u64("used_capacity")?,
        easy_tier: record.get_opt("easy_tier") == Some("on") || record.get_opt("easy_tier") == Some("auto"),
        vdisk_count: record.get_u32("vdisk_count")?,
    })
}

fn vdisk_copy_from_record(record: &CliRecord) -> Result<VdiskCopy, SvcError> {
    Ok(VdiskCopy {
        copy_id: record.get("copy_id")?.to_string(),
        status: record.get_enum("status")?,
        sync: record.get_bool("sync")?,
        primary: record.get_bool("primary")?,
        pool: PoolId::from(record.get("mdisk_grp_name")?),
        easy_tier: record.get_opt("easy_tier") == Some("on"),
        compressed: record.get_opt("compressed_copy") == Some("yes"),
    })
}

fn fcmap_from_record(record: &CliRecord) -> Result<FlashCopyMapping, SvcError> {
    Ok(FlashCopyMapping {
        id: record.get("id")?.to_string(),
        name: record.get("name")?.to_string(),
        source: VdiskName::from(record.get("source_vdisk_name")?),
        target: VdiskName::from(record.get("target_vdisk_name")?),
        status: record.get_enum("status")?,
        progress: record.get_opt("progress").and_then(|p| p.parse().ok()).unwrap_or(0),
        copy_rate: record.get_u32("copy_rate")?,
        autodelete: record.get_opt("autodelete") == Some("on"),
        consist_group: record.get_opt("group_name").map(ToString::to_string),
    })
}
