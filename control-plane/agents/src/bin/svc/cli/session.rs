//! SSH access to the array's administrative CLI. A small pool of sessions
//! is kept against the currently active management address; on connection
//! failure the pool toggles to the other configured address and the call is
//! retried exactly once. The active address is sticky until another failure
//! forces another toggle.

use super::{CliExecutor, CommandOutput};
use agents::errors::SvcError;
use itertools::Itertools;
use parking_lot::Mutex;
use russh::{client, ChannelMsg, Disconnect};
use std::sync::Arc;
use stor_port::types::v0::transport::ManagementEndpoint;
use tokio::sync::Semaphore;

struct Handler;

#[async_trait::async_trait]
impl client::Handler for Handler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // The array is reached over a dedicated management network and is
        // not enrolled in a host key registry.
        Ok(true)
    }
}

/// One authenticated session against a management address.
pub(crate) struct SshSession {
    handle: client::Handle<Handler>,
    address: String,
}

impl SshSession {
    /// Connect and authenticate against the given address.
    async fn connect(endpoint: &ManagementEndpoint, address: &str) -> Result<Self, SvcError> {
        let config = Arc::new(client::Config::default());
        let connecting = client::connect(config, (address, endpoint.port), Handler);
        let mut handle = tokio::time::timeout(endpoint.connect_timeout, connecting)
            .await
            .map_err(|_| SvcError::CliConnectTimeout {
                address: address.to_string(),
                timeout: endpoint.connect_timeout,
            })?
            .map_err(|source| SvcError::CliConnect {
                address: address.to_string(),
                source,
            })?;

        let credentials = &endpoint.credentials;
        let authenticated = match (&credentials.password, &credentials.key_path) {
            (Some(password), _) => handle
                .authenticate_password(credentials.username.as_str(), password.as_str())
                .await
                .map_err(|source| SvcError::CliConnect {
                    address: address.to_string(),
                    source,
                })?,
            (None, Some(key_path)) => {
                let key = russh_keys::load_secret_key(key_path, None).map_err(|_| {
                    SvcError::CliAuth {
                        address: address.to_string(),
                    }
                })?;
                handle
                    .authenticate_publickey(credentials.username.as_str(), Arc::new(key))
                    .await
                    .map_err(|source| SvcError::CliConnect {
                        address: address.to_string(),
                        source,
                    })?
            }
            (None, None) => false,
        };
        if !authenticated {
            return Err(SvcError::CliAuth {
                address: address.to_string(),
            });
        }
        Ok(Self {
            handle,
            address: address.to_string(),
        })
    }

    /// Run one command line, capturing stdout, stderr and the exit status.
    async fn run(&mut self, command: &str) -> Result<CommandOutput, SvcError> {
        let connect_error = |source| SvcError::CliConnect {
            address: self.address.clone(),
            source,
        };
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(connect_error)?;
        channel.exec(true, command).await.map_err(connect_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = 0;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = status,
                _ => {}
            }
        }
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn disconnect(self) {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .ok();
    }
}

/// Which of the two configured management addresses calls are currently
/// routed to. The choice is sticky: it only moves when a failure forces a
/// toggle, never back by itself.
#[derive(Debug)]
pub(crate) struct ActiveAddress {
    primary: String,
    secondary: Option<String>,
    on_secondary: bool,
}

impl ActiveAddress {
    /// Return a new `Self` starting on the primary address.
    pub(crate) fn new(primary: String, secondary: Option<String>) -> Self {
        Self {
            primary,
            secondary,
            on_secondary: false,
        }
    }

    /// The address calls are currently routed to.
    pub(crate) fn current(&self) -> &str {
        match (&self.secondary, self.on_secondary) {
            (Some(secondary), true) => secondary,
            _ => &self.primary,
        }
    }

    /// Toggle to the other address. Returns false when no secondary is
    /// configured, in which case nothing changes.
    pub(crate) fn toggle(&mut self) -> bool {
        if self.secondary.is_none() {
            return false;
        }
        self.on_secondary = !self.on_secondary;
        true
    }
}

/// Pooled SSH sessions bound to the active management address.
pub(crate) struct SshPool {
    endpoint: ManagementEndpoint,
    active: Mutex<ActiveAddress>,
    idle: tokio::sync::Mutex<Vec<SshSession>>,
    limit: Semaphore,
}

impl SshPool {
    /// Establish the pool, warming up the configured number of sessions.
    /// A failure against the primary address toggles to the secondary and
    /// tries once more.
    pub(crate) async fn new(endpoint: ManagementEndpoint) -> Result<Arc<Self>, SvcError> {
        let pool = Arc::new(Self {
            active: Mutex::new(ActiveAddress::new(
                endpoint.primary_address.clone(),
                endpoint.secondary_address.clone(),
            )),
            idle: tokio::sync::Mutex::new(vec![]),
            limit: Semaphore::new(endpoint.pool_max_size),
            endpoint,
        });
        if let Err(error) = pool.warm_up().await {
            if !pool.toggle_active() {
                return Err(error);
            }
            tracing::warn!(error=%error, address=%pool.active(),
                "Failed to reach the primary management address, switching over"
            );
            pool.warm_up().await?;
        }
        Ok(pool)
    }

    /// The currently active management address.
    pub(crate) fn active(&self) -> String {
        self.active.lock().current().to_string()
    }

    /// Toggle to the other configured management address. Returns false
    /// when no secondary is configured.
    fn toggle_active(&self) -> bool {
        self.active.lock().toggle()
    }

    async fn warm_up(&self) -> Result<(), SvcError> {
        let address = self.active();
        let mut idle = self.idle.lock().await;
        idle.retain(|session| session.address == address && !session.is_closed());
        while idle.len() < self.endpoint.pool_min_size {
            idle.push(SshSession::connect(&self.endpoint, &address).await?);
        }
        Ok(())
    }

    /// Check a session out of the pool, discarding ones left over from a
    /// previous address or closed by the peer.
    async fn checkout(&self) -> Result<SshSession, SvcError> {
        let address = self.active();
        {
            let mut idle = self.idle.lock().await;
            while let Some(session) = idle.pop() {
                if session.address == address && !session.is_closed() {
                    return Ok(session);
                }
                session.disconnect().await;
            }
        }
        SshSession::connect(&self.endpoint, &address).await
    }

    async fn give_back(&self, session: SshSession) {
        if !session.is_closed() {
            self.idle.lock().await.push(session);
        }
    }

    async fn try_run(&self, command: &str) -> Result<CommandOutput, SvcError> {
        let mut session = self.checkout().await?;
        match session.run(command).await {
            Ok(output) => {
                self.give_back(session).await;
                Ok(output)
            }
            // the session is dropped, a fresh one is established next call
            Err(error) => Err(error),
        }
    }
}

#[async_trait::async_trait]
impl CliExecutor for SshPool {
    async fn execute(
        &self,
        argv: &[String],
        check_exit_code: bool,
    ) -> Result<CommandOutput, SvcError> {
        let command = argv.iter().join(" ");
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|_| SvcError::Internal {
                details: "SSH session pool is shut down".to_string(),
            })?;

        let output = match self.try_run(&command).await {
            Ok(output) => output,
            Err(error) => {
                if !self.toggle_active() {
                    return Err(error);
                }
                tracing::warn!(error=%error, address=%self.active(),
                    "Management connection failed, retrying against the toggled address"
                );
                self.try_run(&command).await?
            }
        };
        if check_exit_code && !output.success() {
            return Err(SvcError::CliCommandFailed {
                command,
                exit_status: output.exit_status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A failed call toggles to the secondary and stays there; the active
    /// address never reverts by itself.
    #[test]
    fn address_failover_is_sticky() {
        let mut active = ActiveAddress::new("10.0.0.1".into(), Some("10.0.0.2".into()));
        assert_eq!(active.current(), "10.0.0.1");

        // the primary fails once, the secondary takes over
        assert!(active.toggle());
        assert_eq!(active.current(), "10.0.0.2");

        // a subsequent successful call does not move it back
        assert_eq!(active.current(), "10.0.0.2");

        // only another failure toggles again
        assert!(active.toggle());
        assert_eq!(active.current(), "10.0.0.1");
    }

    #[test]
    fn no_secondary_means_no_toggle() {
        let mut active = ActiveAddress::new("10.0.0.1".into(), None);
        assert!(!active.toggle());
        assert_eq!(active.current(), "10.0.0.1");
    }
}
