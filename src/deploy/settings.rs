// ABOUTME: Resolved inputs for one environment's pipeline run.
// ABOUTME: Built from the merged config before any cloud call, so local mistakes fail fast.

use nonempty::NonEmpty;
use std::path::PathBuf;
use std::time::Duration;

use super::launch::LaunchTemplate;
use super::remote::{Payload, PayloadFile, PayloadRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::provider::InstanceTags;
use crate::types::EnvironmentName;
use crate::wait::PollPolicy;

#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub outputs_file: PathBuf,
    pub stack: String,
    pub launch: LaunchTemplate,
    pub settle_delay: Duration,
    pub launch_timeout: Duration,
    pub request: PayloadRequest,
    pub payload: Payload,
    /// Artifact path relative to the payload directory.
    pub artifact: String,
    pub health_policy: PollPolicy,
    pub health_paths: Vec<String>,
    pub work_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl DeploySettings {
    /// Resolve env-backed values and read the payload and user data from disk.
    ///
    /// `config` must already have the environment's overrides applied.
    pub fn from_config(config: &Config, env: &EnvironmentName) -> Result<Self> {
        let read = |path: &PathBuf| {
            PayloadFile::read(path).map_err(|e| {
                Error::InvalidConfig(format!("cannot read payload file {}: {}", path.display(), e))
            })
        };
        let files = config.payload.files();
        let payload_files = NonEmpty {
            head: read(&files.head)?,
            tail: files.tail.iter().map(read).collect::<Result<Vec<_>>>()?,
        };

        let user_data = config
            .instance
            .user_data
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path).map_err(|e| {
                    Error::InvalidConfig(format!(
                        "cannot read user data {}: {}",
                        path.display(),
                        e
                    ))
                })
            })
            .transpose()?;

        if config.healthcheck.paths.is_empty() {
            return Err(Error::InvalidConfig(
                "healthcheck.paths cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            outputs_file: config.outputs.file.clone(),
            stack: config.stack_name(env),
            launch: LaunchTemplate {
                image_id: config.instance.image_id.clone(),
                instance_type: config.instance.instance_type.clone(),
                instance_profile: config.instance_profile(env),
                user_data,
                tags: InstanceTags {
                    name: format!("{}-deploy-{}", config.project, env),
                    environment: env.to_string(),
                    project: config.project.clone(),
                    auto_shutdown: true,
                },
            },
            settle_delay: config.instance.settle_delay,
            launch_timeout: config.instance.launch_timeout,
            request: PayloadRequest {
                repo_url: config.app.repo_url.resolve()?,
                target_dir: config.app.target_dir.clone(),
                port: config.app.port,
            },
            payload: Payload {
                files: payload_files,
                interpreter: config.payload.interpreter.clone(),
                remote_dir: config.payload.remote_dir.clone(),
                setup: config.payload.setup.clone(),
            },
            artifact: config.app.artifact_path(),
            health_policy: config.healthcheck.poll_policy(),
            health_paths: config.healthcheck.paths.clone(),
            work_dir: config.work_dir.clone(),
            logs_dir: config.logs_dir.clone(),
        })
    }
}
