// ABOUTME: Ships the deployment payload to the instance, runs it, and verifies the result.
// ABOUTME: RemoteHost/Connector abstract the SSH session so the pipeline can run against fakes.

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use super::DeployError;
use super::health::{HealthProbe, HealthReport, wait_healthy};
use crate::ssh::{self, CommandOutput, Session, SessionConfig};
use crate::wait::{Clock, PollPolicy};

/// What the remote payload is asked to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadRequest {
    pub repo_url: String,
    pub target_dir: String,
    pub port: u16,
}

/// What the remote deployment produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub exit_code: u32,
    pub artifact_verified: bool,
    pub health_ok: bool,
}

/// A file to place in the remote payload directory.
#[derive(Debug, Clone)]
pub struct PayloadFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl PayloadFile {
    /// Read a local file; the remote name is its file name.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no usable file name", path.display()),
                )
            })?
            .to_string();
        Ok(Self {
            name,
            contents: std::fs::read(path)?,
        })
    }
}

/// Entry script plus support files and how to run them.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The head is the entry script.
    pub files: NonEmpty<PayloadFile>,
    pub interpreter: String,
    /// Directory relative to the login user's home.
    pub remote_dir: String,
    pub setup: Vec<String>,
}

impl Payload {
    pub fn script(&self) -> &str {
        &self.files.head.name
    }

    /// Shell command that installs dependencies, ensures git, and runs the script.
    pub fn command(&self, request: &PayloadRequest) -> String {
        let mut steps = vec!["set -e".to_string(), format!("cd {}", shell_quote(&self.remote_dir))];
        steps.extend(self.setup.iter().cloned());
        steps.push(ENSURE_GIT.to_string());
        steps.push(format!(
            "{} {} {} --target-dir {} --port {} > {} 2>&1",
            self.interpreter,
            shell_quote(self.script()),
            shell_quote(&request.repo_url),
            shell_quote(&request.target_dir),
            request.port,
            REMOTE_LOG,
        ));
        steps.join("\n")
    }

    /// Path of the remote deployment log, relative to the login user's home.
    pub fn log_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), REMOTE_LOG)
    }
}

pub const REMOTE_LOG: &str = "deployment.log";

const ENSURE_GIT: &str =
    "command -v git >/dev/null 2>&1 || sudo yum install -y git || sudo apt-get install -y git";

/// Single-quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Command channel to one instance.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput>;

    async fn upload(&self, remote_path: &str, contents: &[u8]) -> ssh::Result<()>;

    async fn disconnect(&self) -> ssh::Result<()>;
}

/// Opens command channels to instances.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        address: IpAddr,
        credential: &Path,
        known_hosts: &Path,
    ) -> ssh::Result<Box<dyn RemoteHost>>;
}

#[async_trait]
impl RemoteHost for Session {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn upload(&self, remote_path: &str, contents: &[u8]) -> ssh::Result<()> {
        Session::upload(self, &shell_quote(remote_path), contents).await
    }

    async fn disconnect(&self) -> ssh::Result<()> {
        Session::disconnect(self).await
    }
}

/// Connects with russh using the run's credential and known_hosts file.
#[derive(Debug, Clone)]
pub struct SshConnector {
    pub user: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl SshConnector {
    pub fn new(user: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            port,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(1800),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        address: IpAddr,
        credential: &Path,
        known_hosts: &Path,
    ) -> ssh::Result<Box<dyn RemoteHost>> {
        let config = SessionConfig::new(address, &self.user, credential, known_hosts)
            .port(self.port)
            .connect_timeout(self.connect_timeout)
            .command_timeout(self.command_timeout);
        let session = Session::connect(config).await?;
        Ok(Box::new(session))
    }
}

/// Runs the payload on an already-connected host and checks the outcome.
pub struct RemoteExecutor<'a> {
    pub payload: &'a Payload,
    /// Artifact path relative to the payload directory.
    pub artifact: &'a str,
    pub probe: &'a dyn HealthProbe,
    pub clock: &'a dyn Clock,
    pub health_policy: PollPolicy,
    pub health_paths: &'a [String],
}

impl RemoteExecutor<'_> {
    /// Copy every payload file into the remote directory.
    pub async fn ship(&self, host: &dyn RemoteHost) -> Result<(), DeployError> {
        let mkdir = format!("mkdir -p {}", shell_quote(&self.payload.remote_dir));
        let output = host.exec(&mkdir).await?;
        if !output.success() {
            return Err(DeployError::TransportError(format!(
                "could not create {}: {}",
                self.payload.remote_dir,
                output.stderr.trim()
            )));
        }

        for file in self.payload.files.iter() {
            let remote_path = format!(
                "{}/{}",
                self.payload.remote_dir.trim_end_matches('/'),
                file.name
            );
            host.upload(&remote_path, &file.contents).await?;
            tracing::debug!(path = %remote_path, bytes = file.contents.len(), "uploaded payload file");
        }
        Ok(())
    }

    /// Run the payload; non-zero exit is fatal.
    pub async fn invoke(
        &self,
        host: &dyn RemoteHost,
        request: &PayloadRequest,
    ) -> Result<u32, DeployError> {
        let output = host.exec(&self.payload.command(request)).await?;
        if !output.success() {
            let detail = match output.stderr.trim() {
                "" => format!("see {}", REMOTE_LOG),
                stderr => stderr.to_string(),
            };
            return Err(DeployError::RemoteCommandError {
                exit_code: output.exit_code,
                detail,
            });
        }
        Ok(output.exit_code)
    }

    /// Check the build artifact exists.
    pub async fn verify_artifact(&self, host: &dyn RemoteHost) -> Result<(), DeployError> {
        let command = format!(
            "cd {} && test -f {}",
            shell_quote(&self.payload.remote_dir),
            shell_quote(self.artifact)
        );
        let output = host.exec(&command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(DeployError::ArtifactMissing(self.artifact.to_string()))
        }
    }

    /// Full remote phase: ship, invoke, verify, then probe health.
    ///
    /// Health timing out is reported in the result, never as an error.
    pub async fn execute(
        &self,
        host: &dyn RemoteHost,
        address: IpAddr,
        request: &PayloadRequest,
    ) -> Result<(DeployResult, HealthReport), DeployError> {
        self.ship(host).await?;
        tracing::info!(%address, script = %self.payload.script(), "running deployment payload");

        let exit_code = self.invoke(host, request).await?;
        self.verify_artifact(host).await?;
        tracing::info!(%address, artifact = %self.artifact, "artifact verified");

        let health = wait_healthy(
            self.probe,
            self.clock,
            self.health_policy,
            SocketAddr::new(address, request.port),
            self.health_paths,
        )
        .await;

        Ok((
            DeployResult {
                exit_code,
                artifact_verified: true,
                health_ok: health.healthy,
            },
            health,
        ))
    }
}
