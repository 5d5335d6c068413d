// ABOUTME: Config values that may be read from the environment at deploy time.
// ABOUTME: Lets repository URLs and AWS profile settings come from CI secrets instead of the YAML file.

use crate::error::{Error, Result};
use serde::Deserialize;

/// A string config value: either written inline or looked up in the process
/// environment when the run starts.
///
/// ```yaml
/// repo_url: git@github.com:org/app.git
/// repo_url: { env: APP_REPO_URL }
/// repo_url: { env: APP_REPO_URL, default: git@github.com:org/app.git }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) if !val.is_empty() => Ok(val),
                _ => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::Literal(value.to_string())
    }
}

/// Resolve an optional value; an unset variable without default is an error,
/// an absent value is not.
pub fn resolve_optional(value: Option<&EnvValue>) -> Result<Option<String>> {
    value.map(EnvValue::resolve).transpose()
}
