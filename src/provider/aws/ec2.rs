// ABOUTME: Compute and key pair operations through `aws ec2`.
// ABOUTME: run-instances, describe-instances, waiters, terminate-instances, describe-key-pairs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{AwsCli, CliError};
use crate::provider::{
    ComputeError, ComputeOps, Instance, InstanceState, KeyPairOps, LaunchSpec, SecretError,
};
use crate::types::{InstanceId, KeyPairId};

const NOT_FOUND_CODES: &[&str] = &["InvalidInstanceID.NotFound", "InvalidInstanceID.Malformed"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    instances: Vec<LaunchedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchedInstance {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<DescribedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedInstance {
    instance_id: String,
    state: DescribedState,
    #[serde(default)]
    public_ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedState {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeKeyPairsOutput {
    #[serde(default)]
    key_pairs: Vec<KeyPairInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPairInfo {
    key_pair_id: String,
}

fn tag_specifications(spec: &LaunchSpec) -> String {
    let tags: Vec<_> = spec
        .tags
        .pairs()
        .into_iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect();
    json!([
        { "ResourceType": "instance", "Tags": tags },
        { "ResourceType": "volume", "Tags": tags },
    ])
    .to_string()
}

fn into_instance(described: DescribedInstance) -> Result<Instance, ComputeError> {
    let state = InstanceState::parse(&described.state.name).ok_or_else(|| {
        ComputeError::Provider(format!("unknown instance state: {}", described.state.name))
    })?;
    let public_ip = described
        .public_ip_address
        .map(|ip| {
            ip.parse()
                .map_err(|_| ComputeError::Provider(format!("invalid public address: {ip}")))
        })
        .transpose()?;

    Ok(Instance {
        id: InstanceId::new(described.instance_id),
        public_ip,
        state,
    })
}

#[async_trait]
impl ComputeOps for AwsCli {
    async fn launch_instance(&self, spec: &LaunchSpec) -> Result<InstanceId, ComputeError> {
        let profile = format!("Name={}", spec.instance_profile);
        let tags = tag_specifications(spec);
        let mut args = vec![
            "ec2",
            "run-instances",
            "--image-id",
            spec.image_id.as_str(),
            "--instance-type",
            spec.instance_type.as_str(),
            "--key-name",
            spec.key_name.as_str(),
            "--security-group-ids",
            spec.security_group_id.as_str(),
            "--subnet-id",
            spec.subnet_id.as_str(),
            "--iam-instance-profile",
            profile.as_str(),
            "--tag-specifications",
            tags.as_str(),
            "--count",
            "1",
        ];
        if let Some(ref user_data) = spec.user_data {
            args.push("--user-data");
            args.push(user_data.as_str());
        }

        let output: RunInstancesOutput = self
            .json(&args)
            .await
            .map_err(|e| ComputeError::Rejected(e.to_string()))?;

        output
            .instances
            .into_iter()
            .next()
            .map(|i| InstanceId::new(i.instance_id))
            .ok_or_else(|| ComputeError::Rejected("provider returned no instance".to_string()))
    }

    async fn wait_until_running(&self, id: &InstanceId) -> Result<(), ComputeError> {
        self.run(&["ec2", "wait", "instance-running", "--instance-ids", id.as_str()])
            .await
            .map(|_| ())
            .map_err(|e| ComputeError::WaitFailed(e.to_string()))
    }

    async fn describe_instance(&self, id: &InstanceId) -> Result<Option<Instance>, ComputeError> {
        let result: Result<DescribeInstancesOutput, CliError> = self
            .json(&["ec2", "describe-instances", "--instance-ids", id.as_str()])
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.has_code(NOT_FOUND_CODES) => return Ok(None),
            Err(e) => return Err(ComputeError::Provider(e.to_string())),
        };

        output
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .find(|i| i.instance_id == id.as_str())
            .map(into_instance)
            .transpose()
    }

    async fn terminate_instance(&self, id: &InstanceId) -> Result<(), ComputeError> {
        match self
            .run(&["ec2", "terminate-instances", "--instance-ids", id.as_str()])
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.has_code(NOT_FOUND_CODES) => Err(ComputeError::NotFound(id.to_string())),
            Err(e) => Err(ComputeError::Provider(e.to_string())),
        }
    }

    async fn wait_until_terminated(&self, id: &InstanceId) -> Result<(), ComputeError> {
        self.run(&["ec2", "wait", "instance-terminated", "--instance-ids", id.as_str()])
            .await
            .map(|_| ())
            .map_err(|e| ComputeError::WaitFailed(e.to_string()))
    }
}

#[async_trait]
impl KeyPairOps for AwsCli {
    async fn key_pair_ids(&self, name: &str) -> Result<Vec<KeyPairId>, SecretError> {
        let filter = format!("Name=key-name,Values={name}");
        let result: Result<DescribeKeyPairsOutput, CliError> = self
            .json(&["ec2", "describe-key-pairs", "--filters", filter.as_str()])
            .await;

        match result {
            Ok(output) => Ok(output
                .key_pairs
                .into_iter()
                .map(|k| KeyPairId::new(k.key_pair_id))
                .collect()),
            Err(e) if e.has_code(&["InvalidKeyPair.NotFound"]) => Ok(Vec::new()),
            Err(e) if e.is_access_denied() => Err(SecretError::AccessDenied(e.to_string())),
            Err(e) => Err(SecretError::Provider(e.to_string())),
        }
    }
}
