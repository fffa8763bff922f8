/// Typed command wrappers, one per CLI verb.
pub(crate) mod client;
/// Parser for the CLI's delimited key/value output.
pub(crate) mod parser;
/// Pooled SSH sessions to the management addresses.
pub(crate) mod session;

use agents::errors::SvcError;

/// Captured output of one CLI invocation.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandOutput {
    /// Captured stdout.
    pub(crate) stdout: String,
    /// Captured stderr.
    pub(crate) stderr: String,
    /// Exit status of the remote command.
    pub(crate) exit_status: u32,
}

impl CommandOutput {
    /// Whether the remote command exited cleanly.
    pub(crate) fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// The seam through which command lines reach the array. The production
/// implementation is `session::SshPool`; tests substitute an in-process
/// fake array.
#[async_trait::async_trait]
pub(crate) trait CliExecutor: Send + Sync {
    /// Execute a single command line against the array CLI.
    /// With `check_exit_code` a nonzero exit status is converted into
    /// `SvcError::CliCommandFailed`; without it the caller inspects the
    /// returned output itself.
    async fn execute(
        &self,
        argv: &[String],
        check_exit_code: bool,
    ) -> Result<CommandOutput, SvcError>;
}
