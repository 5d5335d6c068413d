// ABOUTME: Validated environment name (dev, staging, prod, ...).
// ABOUTME: Environment names are embedded in stack, cluster, and tag values, so they follow RFC 1123 label rules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvironmentNameError {
    #[error("environment name cannot be empty")]
    Empty,

    #[error("environment name exceeds maximum length of 32 characters")]
    TooLong,

    #[error("environment name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("environment name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("environment name must be lowercase")]
    NotLowercase,

    #[error("invalid character in environment name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    pub fn new(value: &str) -> Result<Self, EnvironmentNameError> {
        if value.is_empty() {
            return Err(EnvironmentNameError::Empty);
        }

        if value.len() > 32 {
            return Err(EnvironmentNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(EnvironmentNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(EnvironmentNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(EnvironmentNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(EnvironmentNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute `{env}` placeholders in a naming template.
    pub fn expand(&self, template: &str) -> String {
        template.replace("{env}", &self.0)
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EnvironmentName {
    type Err = EnvironmentNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for EnvironmentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EnvironmentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_names() {
        for name in ["dev", "staging", "prod", "pr-42"] {
            assert!(EnvironmentName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        assert!(matches!(
            EnvironmentName::new("Dev"),
            Err(EnvironmentNameError::NotLowercase)
        ));
        assert!(matches!(
            EnvironmentName::new("dev_1"),
            Err(EnvironmentNameError::InvalidChar('_'))
        ));
        assert!(matches!(
            EnvironmentName::new("-dev"),
            Err(EnvironmentNameError::StartsWithHyphen)
        ));
    }

    #[test]
    fn expand_substitutes_every_placeholder() {
        let env = EnvironmentName::new("dev").unwrap();
        assert_eq!(env.expand("EC2DeploymentStack-{env}"), "EC2DeploymentStack-dev");
        assert_eq!(env.expand("{env}/{env}"), "dev/dev");
        assert_eq!(env.expand("fixed"), "fixed");
    }
}
