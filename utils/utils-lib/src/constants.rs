/// Various common constants used by the control plane.

/// Default timeout for establishing an SSH connection to the array CLI.
pub const DEFAULT_CONN_TIMEOUT: &str = "30s";

/// Default TCP port of the array's administrative CLI.
pub const DEFAULT_CLI_PORT: u16 = 22;

/// Default field delimiter requested from the array CLI (`-delim`).
pub const CLI_FIELD_DELIMITER: char = '!';

/// Minimum number of warm SSH sessions kept in the pool.
pub const DEFAULT_SSH_POOL_MIN: usize = 1;
/// Maximum number of concurrent SSH sessions (bounds in-flight CLI calls).
pub const DEFAULT_SSH_POOL_MAX: usize = 5;

/// The period at which a FlashCopy mapping or consistency group is polled
/// while waiting for it to reach the `prepared` state.
pub const FLASHCOPY_POLL_PERIOD: &str = "5s";

/// Default bound on the whole prepare phase of a FlashCopy operation.
pub const FLASHCOPY_PREPARE_TIMEOUT: &str = "120s";

/// The period at which pending vdisk-copy operations are checked for
/// synchronisation.
pub const COPYOPS_RECONCILE_PERIOD: &str = "600s";

/// The period at which the registry refreshes its cached view of the
/// cluster topology (nodes, I/O groups, pools).
pub const CACHE_POLL_PERIOD: &str = "30s";

/// Default copy rate for a background FlashCopy (clone). 0 means no
/// background copy, i.e. a snapshot-style mapping.
pub const DEFAULT_FLASHCOPY_RATE: u32 = 50;

/// Default grain size in KB for thin-provisioned and FlashCopy vdisks.
pub const DEFAULT_GRAIN_SIZE: u32 = 256;

/// The admin metadata key under which pending vdisk-copy operations are
/// persisted, encoded as `orig:new;orig:new;...`.
pub const VDISKCOPYOPS_METADATA_KEY: &str = "vdiskcopyops";
