// ABOUTME: Configuration types and parsing for ephemeron.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and per-environment merging.

mod app;
mod aws;
mod env_value;
mod healthcheck;
mod init;
mod instance;
mod rollback;

pub use app::{AppConfig, AppOverrides, PayloadConfig};
pub use aws::AwsConfig;
pub use env_value::{EnvValue, resolve_optional};
pub use healthcheck::HealthcheckConfig;
pub use init::init_config;
pub use instance::{InstanceConfig, InstanceOverrides};
pub use rollback::RollbackConfig;

use crate::error::{Error, Result};
use crate::types::EnvironmentName;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "ephemeron.yml";
pub const CONFIG_FILENAME_ALT: &str = "ephemeron.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".ephemeron/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Value of the `Project` tag; also available as `{project}` in templates.
    pub project: String,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub outputs: OutputsConfig,

    pub instance: InstanceConfig,

    pub app: AppConfig,

    pub payload: PayloadConfig,

    #[serde(default)]
    pub healthcheck: HealthcheckConfig,

    #[serde(default)]
    pub rollback: RollbackConfig,

    /// Local directory receiving per-run diagnostics.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Local directory holding per-run private state (credential, known_hosts).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// When non-empty, only these environments may be deployed.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsConfig {
    /// Provisioning-result document, e.g. the output of `cdk deploy --outputs-file`.
    #[serde(default = "default_outputs_file")]
    pub file: PathBuf,

    /// Stack name template; `{env}` is substituted.
    #[serde(default = "default_stack")]
    pub stack: String,
}

fn default_outputs_file() -> PathBuf {
    PathBuf::from("cdk-outputs.json")
}

fn default_stack() -> String {
    "EC2DeploymentStack-{env}".to_string()
}

impl Default for OutputsConfig {
    fn default() -> Self {
        OutputsConfig {
            file: default_outputs_file(),
            stack: default_stack(),
        }
    }
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("deployment-logs")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".ephemeron/runs")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentOverrides {
    #[serde(default)]
    pub region: Option<EnvValue>,

    #[serde(default)]
    pub stack: Option<String>,

    #[serde(default)]
    pub instance: InstanceOverrides,

    #[serde(default)]
    pub app: AppOverrides,

    #[serde(default)]
    pub rollback: Option<RollbackConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Merge the overrides declared for `env` on top of the base config.
    pub fn for_environment(&self, env: &EnvironmentName) -> Result<Config> {
        let overrides = match self.environments.get(env.as_str()) {
            Some(overrides) => overrides,
            None if self.environments.is_empty() => return Ok(self.clone()),
            None => return Err(Error::UnknownEnvironment(env.to_string())),
        };

        let mut merged = self.clone();

        if overrides.region.is_some() {
            merged.aws.region = overrides.region.clone();
        }

        if let Some(ref stack) = overrides.stack {
            merged.outputs.stack = stack.clone();
        }

        merged.instance.apply(&overrides.instance);
        merged.app.apply(&overrides.app);

        if let Some(ref rollback) = overrides.rollback {
            merged.rollback = rollback.clone();
        }

        Ok(merged)
    }

    /// Expand `{env}` and `{project}` placeholders in a naming template.
    pub fn expand(&self, template: &str, env: &EnvironmentName) -> String {
        env.expand(template).replace("{project}", &self.project)
    }

    pub fn stack_name(&self, env: &EnvironmentName) -> String {
        self.expand(&self.outputs.stack, env)
    }

    pub fn instance_profile(&self, env: &EnvironmentName) -> String {
        self.expand(&self.instance.instance_profile, env)
    }

    pub fn cluster_name(&self, env: &EnvironmentName) -> String {
        self.expand(&self.rollback.cluster, env)
    }

    pub fn service_name(&self, env: &EnvironmentName) -> String {
        self.expand(&self.rollback.service, env)
    }

    pub fn template() -> Self {
        Config {
            project: "my-app".to_string(),
            aws: AwsConfig::default(),
            outputs: OutputsConfig::default(),
            instance: InstanceConfig::template(),
            app: AppConfig {
                repo_url: EnvValue::Literal("git@github.com:org/my-app.git".to_string()),
                target_dir: "./app".to_string(),
                port: 9000,
                artifact: "build/libs/project.jar".to_string(),
            },
            payload: PayloadConfig::template(),
            healthcheck: HealthcheckConfig::default(),
            rollback: RollbackConfig::default(),
            logs_dir: default_logs_dir(),
            work_dir: default_work_dir(),
            environments: HashMap::new(),
        }
    }
}
