// ABOUTME: Secret store binding through `aws ssm get-parameter --with-decryption`.
// ABOUTME: Key pairs created by the provisioner keep their private key at /ec2/keypair/<id>.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AwsCli, CliError};
use crate::provider::{SecretError, SecretStore};
use crate::types::KeyPairId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterOutput {
    parameter: Parameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

/// Parameter name under which the private key of `id` is stored.
pub fn key_parameter_name(id: &KeyPairId) -> String {
    format!("/ec2/keypair/{id}")
}

#[async_trait]
impl SecretStore for AwsCli {
    async fn fetch_private_key(&self, id: &KeyPairId) -> Result<String, SecretError> {
        let name = key_parameter_name(id);
        let result: Result<GetParameterOutput, CliError> = self
            .json(&["ssm", "get-parameter", "--name", name.as_str(), "--with-decryption"])
            .await;

        match result {
            Ok(output) => Ok(output.parameter.value),
            Err(e) if e.has_code(&["ParameterNotFound"]) => Err(SecretError::NotFound(name)),
            Err(e) if e.is_access_denied() => Err(SecretError::AccessDenied(e.to_string())),
            Err(e) => Err(SecretError::Provider(e.to_string())),
        }
    }
}
