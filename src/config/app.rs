// ABOUTME: Application and payload settings for the remote deployment.
// ABOUTME: What to clone and build on the instance, and which local files to ship there.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

use super::EnvValue;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub repo_url: EnvValue,

    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Build output checked after the payload ran, relative to `target_dir`.
    #[serde(default = "default_artifact")]
    pub artifact: String,
}

fn default_target_dir() -> String {
    "./app".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_artifact() -> String {
    "build/libs/project.jar".to_string()
}

impl AppConfig {
    /// Remote path of the build artifact, relative to the payload directory.
    pub fn artifact_path(&self) -> String {
        format!(
            "{}/{}",
            self.target_dir.trim_end_matches('/'),
            self.artifact.trim_start_matches('/')
        )
    }
}

/// Per-environment overrides for [`AppConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppOverrides {
    #[serde(default)]
    pub repo_url: Option<EnvValue>,
    #[serde(default)]
    pub target_dir: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl AppConfig {
    pub(crate) fn apply(&mut self, overrides: &AppOverrides) {
        if let Some(ref repo_url) = overrides.repo_url {
            self.repo_url = repo_url.clone();
        }
        if let Some(ref target_dir) = overrides.target_dir {
            self.target_dir = target_dir.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    /// Entry script, invoked as `<interpreter> <script> <repo-url> --target-dir <dir> --port <port>`.
    pub script: PathBuf,

    /// Support files shipped next to the script.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory on the instance, relative to the login user's home.
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Commands run in `remote_dir` before the script, e.g. dependency installs.
    #[serde(default = "default_setup")]
    pub setup: Vec<String>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_remote_dir() -> String {
    "deploy".to_string()
}

fn default_setup() -> Vec<String> {
    vec!["if [ -f requirements.txt ]; then python3 -m pip install --user -q -r requirements.txt; fi".to_string()]
}

impl PayloadConfig {
    /// All files to upload; the entry script always comes first.
    pub fn files(&self) -> NonEmpty<PathBuf> {
        NonEmpty {
            head: self.script.clone(),
            tail: self.files.clone(),
        }
    }

    pub fn template() -> Self {
        PayloadConfig {
            script: PathBuf::from("deployment_script.py"),
            files: vec![PathBuf::from("secrets_manager.py")],
            interpreter: default_interpreter(),
            remote_dir: default_remote_dir(),
            setup: default_setup(),
        }
    }
}
