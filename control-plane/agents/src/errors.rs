use snafu::Snafu;
use stor_port::types::v0::{
    store::definitions::StoreError,
    transport::{FcMapStatus, PoolId, VdiskName, VolumeId},
};
use stor_port::transport_api::ResourceKind;

/// Common error type for all service calls.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[allow(missing_docs)]
pub enum SvcError {
    #[snafu(display("Failed to connect to management address '{}'", address))]
    CliConnect {
        address: String,
        source: russh::Error,
    },
    #[snafu(display(
        "Timed out after '{:?}' attempting to connect to management address '{}'",
        timeout,
        address
    ))]
    CliConnectTimeout {
        address: String,
        timeout: std::time::Duration,
    },
    #[snafu(display("Authentication rejected by management address '{}'", address))]
    CliAuth { address: String },
    #[snafu(display(
        "Command '{}' failed with exit status {}, stdout '{}', stderr '{}'",
        command,
        exit_status,
        stdout,
        stderr
    ))]
    CliCommandFailed {
        command: String,
        exit_status: u32,
        stdout: String,
        stderr: String,
    },
    #[snafu(display("Command '{}' produced unexpected output '{}'", command, output))]
    CliUnexpectedOutput { command: String, output: String },
    #[snafu(display("Failed to parse output of command '{}': {}, output '{}'", command, reason, output))]
    CliParse {
        command: String,
        reason: String,
        output: String,
    },
    #[snafu(display(
        "Command '{}' did not report a created object id, output '{}'",
        command,
        output
    ))]
    MissingSuccessId { command: String, output: String },
    #[snafu(display("Field '{}' missing from the output of command '{}'", field, command))]
    MissingField { command: String, field: String },
    #[snafu(display("{} '{}' not found", kind.to_string(), id))]
    NotFound { kind: ResourceKind, id: String },
    #[snafu(display("{} '{}' already exists", kind.to_string(), id))]
    AlreadyExists { kind: ResourceKind, id: String },
    #[snafu(display(
        "The FlashCopy mapping or consistency group '{}' is in another state: cannot apply '{}' while '{}'",
        name,
        trigger,
        state
    ))]
    FcMapTransition {
        name: String,
        state: String,
        trigger: String,
    },
    #[snafu(display(
        "FlashCopy mapping '{}' did not reach the prepared state within {:?}, last status '{}'",
        name,
        timeout,
        status
    ))]
    FcPrepareTimeout {
        name: String,
        timeout: std::time::Duration,
        status: FcMapStatus,
    },
    #[snafu(display(
        "Vdisk '{}' already has the maximum number of copies, cannot add another",
        vdisk
    ))]
    MaximumCopies { vdisk: VdiskName },
    #[snafu(display(
        "Snapshots of vdisk '{}' prevent the operation and are not allowed here",
        vdisk
    ))]
    VdiskHasSnapshots { vdisk: VdiskName },
    #[snafu(display("Invalid value '{}' for option '{}': {}", value, option, reason))]
    InvalidOption {
        option: String,
        value: String,
        reason: String,
    },
    #[snafu(display("Compression is requested but the compression license is not active"))]
    CompressionNotLicensed {},
    #[snafu(display(
        "Invalid resize of volume '{}': new size {} must be larger than current size {}",
        uuid,
        new_size,
        size
    ))]
    ResizeInvalid {
        uuid: VolumeId,
        size: u64,
        new_size: u64,
    },
    #[snafu(display(
        "Volume '{}' of size {} cannot be created from a source of size {}",
        uuid,
        size,
        source_size
    ))]
    SourceSizeInvalid {
        uuid: VolumeId,
        size: u64,
        source_size: u64,
    },
    #[snafu(display("Cannot manage vdisk '{}': {}", vdisk, reason))]
    ManageMismatch { vdisk: VdiskName, reason: String },
    #[snafu(display("Pool '{}' is not known to this backend", pool))]
    PoolNotFound { pool: PoolId },
    #[snafu(display("Replication is requested but no replication target is configured"))]
    ReplicationNotConfigured {},
    #[snafu(display(
        "Failover target '{}' does not match the configured replication target '{}'",
        requested,
        configured
    ))]
    ReplicationTargetMismatch {
        requested: String,
        configured: String,
    },
    #[snafu(display(
        "Volume '{}' is in replication state '{}'; failback requires every volume to be synchronized",
        volume,
        state
    ))]
    FailbackNotReady { volume: VolumeId, state: String },
    #[snafu(display("Storage Error"))]
    Store { source: StoreError },
    #[snafu(display("Internal error: {}", details))]
    Internal { details: String },
}

impl From<StoreError> for SvcError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

impl SvcError {
    /// A `NotFound` error for the given resource kind and id.
    pub fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
