// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, key-file authentication, command execution and file transfer.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts::{check_known_hosts_path, learn_known_hosts_path};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: IpAddr,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Private key file written for this run.
    pub key_path: PathBuf,
    /// Accept and record host keys not yet present in `known_hosts_path`.
    pub trust_on_first_use: bool,
    /// known_hosts file scoped to the run.
    pub known_hosts_path: PathBuf,
    /// Timeout for TCP connect plus handshake (default: 30 seconds).
    pub connect_timeout: Duration,
    /// Timeout for command execution (default: 30 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        host: IpAddr,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
        known_hosts_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            port: 22,
            user: user.into(),
            key_path: key_path.into(),
            trust_on_first_use: true,
            known_hosts_path: known_hosts_path.into(),
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(1800),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: PathBuf,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match check_known_hosts_path(
            &self.host,
            self.port,
            server_public_key,
            &self.known_hosts_path,
        ) {
            Ok(true) => Ok(true),
            Ok(false) if self.trust_on_first_use => {
                tracing::debug!(
                    host = %self.host,
                    port = self.port,
                    "recording host key for fresh instance"
                );
                if let Err(e) = learn_known_hosts_path(
                    &self.host,
                    self.port,
                    server_public_key,
                    &self.known_hosts_path,
                ) {
                    tracing::warn!("failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    host = %self.host,
                    line,
                    "host key changed during run, refusing connection"
                );
                Ok(false)
            }
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate with the configured key.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let key = load_secret_key(&config.key_path, None).map_err(|e| Error::KeyLoadFailed {
            path: config.key_path.clone(),
            reason: e.to_string(),
        })?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let handler = SshHandler {
            host: config.host.to_string(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let connect = client::connect(Arc::new(russh_config), (config.host, config.port), handler);
        let mut session = match tokio::time::timeout(config.connect_timeout, connect).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Err(if e.to_string().contains("Connection refused") {
                    Error::Connection(format!(
                        "connection refused to {}:{}",
                        config.host, config.port
                    ))
                } else {
                    Error::Connection(e.to_string())
                });
            }
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    host: config.host.to_string(),
                    port: config.port,
                    timeout: config.connect_timeout,
                });
            }
        };

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(Error::Protocol)?
            .flatten();

        let auth = session
            .authenticate_publickey(
                &config.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(Error::Protocol)?;

        if !auth.success() {
            return Err(Error::AuthenticationFailed(config.user.clone()));
        }

        tracing::debug!(host = %config.host, user = %config.user, "ssh session established");

        Ok(Self {
            config,
            handle: session,
        })
    }

    pub fn host(&self) -> IpAddr {
        self.config.host
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command, None)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    /// Write `contents` to `remote_path`, replacing any existing file.
    pub async fn upload(&self, remote_path: &str, contents: &[u8]) -> Result<()> {
        let command = format!("cat > {}", remote_path);
        let output = match tokio::time::timeout(
            self.config.command_timeout,
            self.exec_inner(&command, Some(contents)),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(Error::CommandTimeout(self.config.command_timeout)),
        };

        if !output.success() {
            return Err(Error::UploadFailed {
                path: remote_path.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Read a remote file through `command` (e.g. `sudo cat <path>`).
    ///
    /// Returns the command output as-is so callers can tell a missing file from
    /// a transport failure.
    pub async fn read_file(&self, command: &str) -> Result<CommandOutput> {
        self.exec(command).await
    }

    async fn exec_inner(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        if let Some(input) = stdin {
            channel.data(input).await.map_err(|e| Error::UploadFailed {
                path: command.to_string(),
                reason: e.to_string(),
            })?;
            channel.eof().await.map_err(Error::Protocol)?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        // No exit status means the connection dropped mid-command.
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Disconnect the session.
    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
