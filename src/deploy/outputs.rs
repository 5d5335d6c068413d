// ABOUTME: Reads the provisioning-result document and extracts per-environment infrastructure values.
// ABOUTME: The document maps stack name to a flat object of named outputs.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

use super::DeployError;
use crate::types::{SecurityGroupId, SubnetId};

pub const SECURITY_GROUP_KEY: &str = "SecurityGroupId";
pub const SUBNET_KEY: &str = "SubnetId";
pub const KEY_PAIR_KEY: &str = "KeyPairName";

/// Network placement and key pair the provisioner created for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfrastructureOutputs {
    pub security_group_id: SecurityGroupId,
    pub subnet_id: SubnetId,
    pub key_pair_name: String,
}

/// Read `path` and extract the outputs of `stack`.
pub fn read_outputs(path: &Path, stack: &str) -> Result<InfrastructureOutputs, DeployError> {
    let document = std::fs::read_to_string(path).map_err(|e| DeployError::MalformedDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    extract_outputs(path, &document, stack)
}

/// Extract the outputs of `stack` from an already-loaded document.
///
/// `path` is only used in error messages.
pub fn extract_outputs(
    path: &Path,
    document: &str,
    stack: &str,
) -> Result<InfrastructureOutputs, DeployError> {
    let malformed = |reason: String| DeployError::MalformedDocument {
        path: path.to_path_buf(),
        reason,
    };

    let root: Value = serde_json::from_str(document).map_err(|e| malformed(e.to_string()))?;
    let stacks = root
        .as_object()
        .ok_or_else(|| malformed("top level is not an object".to_string()))?;

    // Every entry must itself be an object, not just the one we read.
    if let Some((name, _)) = stacks.iter().find(|(_, v)| !v.is_object()) {
        return Err(malformed(format!("stack {name} is not an object")));
    }

    let outputs = stacks
        .get(stack)
        .and_then(Value::as_object)
        .ok_or_else(|| DeployError::StackNotFound {
            path: path.to_path_buf(),
            stack: stack.to_string(),
        })?;

    Ok(InfrastructureOutputs {
        security_group_id: SecurityGroupId::new(required(outputs, stack, SECURITY_GROUP_KEY)?),
        subnet_id: SubnetId::new(required(outputs, stack, SUBNET_KEY)?),
        key_pair_name: required(outputs, stack, KEY_PAIR_KEY)?,
    })
}

fn required(
    outputs: &Map<String, Value>,
    stack: &str,
    key: &'static str,
) -> Result<String, DeployError> {
    outputs
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeployError::MissingOutput {
            stack: stack.to_string(),
            key,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::ErrorClass;

    const STACK: &str = "EC2DeploymentStack-dev";

    fn extract(document: &str) -> Result<InfrastructureOutputs, DeployError> {
        extract_outputs(Path::new("cdk-outputs.json"), document, STACK)
    }

    #[test]
    fn extracts_all_values() {
        let outputs = extract(
            r#"{"EC2DeploymentStack-dev": {
                "SecurityGroupId": "sg-1",
                "SubnetId": "subnet-1",
                "KeyPairName": "kp-dev",
                "VpcId": "vpc-9"
            }}"#,
        )
        .unwrap();

        assert_eq!(outputs.security_group_id.as_str(), "sg-1");
        assert_eq!(outputs.subnet_id.as_str(), "subnet-1");
        assert_eq!(outputs.key_pair_name, "kp-dev");
    }

    #[test]
    fn picks_the_requested_stack() {
        let outputs = extract(
            r#"{
                "EC2DeploymentStack-prod": {"SecurityGroupId": "sg-p", "SubnetId": "subnet-p", "KeyPairName": "kp-prod"},
                "EC2DeploymentStack-dev": {"SecurityGroupId": "sg-d", "SubnetId": "subnet-d", "KeyPairName": "kp-dev"}
            }"#,
        )
        .unwrap();
        assert_eq!(outputs.key_pair_name, "kp-dev");
    }

    #[test]
    fn missing_subnet_is_a_configuration_error() {
        let err = extract(
            r#"{"EC2DeploymentStack-dev": {"SecurityGroupId": "sg-1", "KeyPairName": "kp-dev"}}"#,
        )
        .unwrap_err();

        assert!(matches!(err, DeployError::MissingOutput { key: SUBNET_KEY, .. }));
        assert_eq!(err.class(), ErrorClass::Configuration);
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let err = extract(
            r#"{"EC2DeploymentStack-dev": {"SecurityGroupId": "sg-1", "SubnetId": "subnet-1", "KeyPairName": "  "}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::MissingOutput { key: KEY_PAIR_KEY, .. }));
    }

    #[test]
    fn absent_stack() {
        let err = extract(r#"{"OtherStack": {}}"#).unwrap_err();
        assert!(matches!(err, DeployError::StackNotFound { .. }));
    }

    #[test]
    fn not_json() {
        let err = extract("not json").unwrap_err();
        assert!(matches!(err, DeployError::MalformedDocument { .. }));
    }

    #[test]
    fn not_an_object_of_objects() {
        let err = extract(r#"{"EC2DeploymentStack-dev": "sg-1"}"#).unwrap_err();
        assert!(matches!(err, DeployError::MalformedDocument { .. }));

        let err = extract(r#"["EC2DeploymentStack-dev"]"#).unwrap_err();
        assert!(matches!(err, DeployError::MalformedDocument { .. }));
    }

    #[test]
    fn unreadable_file_is_malformed() {
        let err = read_outputs(Path::new("/nonexistent/cdk-outputs.json"), STACK).unwrap_err();
        assert!(matches!(err, DeployError::MalformedDocument { .. }));
    }
}
