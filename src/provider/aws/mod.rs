// ABOUTME: Provider binding that drives the aws command-line client.
// ABOUTME: Each operation is one `aws ... --output json` invocation parsed with serde_json.

mod ec2;
mod ecs;
mod error;
mod ssm;

pub use error::{CliError, error_code};

use serde::de::DeserializeOwned;
use snafu::ResultExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::{AwsConfig, resolve_optional};

use error::{FailedSnafu, ParseSnafu, SpawnSnafu};

/// Handle on the `aws` executable with a fixed region and profile.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: PathBuf,
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            region: None,
            profile: None,
        }
    }

    /// Build from config, resolving env-backed region and profile now.
    pub fn from_config(config: &AwsConfig) -> crate::error::Result<Self> {
        Ok(Self {
            program: config.cli.clone(),
            region: resolve_optional(config.region.as_ref())?,
            profile: resolve_optional(config.profile.as_ref())?,
        })
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Arguments appended to every invocation.
    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--output".to_string(), "json".to_string()];
        if let Some(ref region) = self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        if let Some(ref profile) = self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    /// Run one command and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, CliError> {
        let operation = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        tracing::debug!(%operation, ?args, "invoking aws cli");

        let output = Command::new(&self.program)
            .args(args)
            .args(self.common_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context(SpawnSnafu {
                program: self.program.display().to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return FailedSnafu {
                operation,
                code: error_code(&stderr),
                stderr,
            }
            .fail();
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run one command and deserialize its JSON output.
    async fn json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, CliError> {
        let stdout = self.run(args).await?;
        let operation = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        serde_json::from_str(&stdout).context(ParseSnafu { operation })
    }
}
