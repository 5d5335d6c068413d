// ABOUTME: Cloud provider access settings.
// ABOUTME: Region, named profile, and the path of the aws command-line client.

use serde::Deserialize;
use std::path::PathBuf;

use super::EnvValue;

#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub region: Option<EnvValue>,

    #[serde(default)]
    pub profile: Option<EnvValue>,

    #[serde(default = "default_cli")]
    pub cli: PathBuf,
}

fn default_cli() -> PathBuf {
    PathBuf::from("aws")
}

impl Default for AwsConfig {
    fn default() -> Self {
        AwsConfig {
            region: None,
            profile: None,
            cli: default_cli(),
        }
    }
}
