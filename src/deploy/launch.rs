// ABOUTME: Requests the ephemeral instance and waits until its address can be trusted.
// ABOUTME: Provider wait-until-running, then a fixed settle delay through the injected clock.

use std::net::IpAddr;
use std::time::Duration;

use super::DeployError;
use super::outputs::InfrastructureOutputs;
use crate::provider::{ComputeError, ComputeOps, InstanceState, InstanceTags, LaunchSpec};
use crate::types::InstanceId;
use crate::wait::Clock;

/// Instance settings that do not come from the provisioning outputs.
#[derive(Debug, Clone)]
pub struct LaunchTemplate {
    pub image_id: String,
    pub instance_type: String,
    pub instance_profile: String,
    pub user_data: Option<String>,
    pub tags: InstanceTags,
}

impl LaunchTemplate {
    /// Combine with the provisioner's outputs into a full request.
    pub fn to_spec(&self, outputs: &InfrastructureOutputs) -> LaunchSpec {
        LaunchSpec {
            image_id: self.image_id.clone(),
            instance_type: self.instance_type.clone(),
            key_name: outputs.key_pair_name.clone(),
            security_group_id: outputs.security_group_id.clone(),
            subnet_id: outputs.subnet_id.clone(),
            instance_profile: self.instance_profile.clone(),
            user_data: self.user_data.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Launch is split in two so the caller can take ownership of the id
/// before any waiting happens.
pub struct InstanceLauncher<'a> {
    compute: &'a dyn ComputeOps,
    clock: &'a dyn Clock,
    settle_delay: Duration,
    launch_timeout: Duration,
}

impl<'a> InstanceLauncher<'a> {
    pub fn new(
        compute: &'a dyn ComputeOps,
        clock: &'a dyn Clock,
        settle_delay: Duration,
        launch_timeout: Duration,
    ) -> Self {
        Self {
            compute,
            clock,
            settle_delay,
            launch_timeout,
        }
    }

    /// Ask the provider for an instance.
    pub async fn request(&self, spec: &LaunchSpec) -> Result<InstanceId, DeployError> {
        let id = self
            .compute
            .launch_instance(spec)
            .await
            .map_err(|e| DeployError::LaunchError(e.to_string()))?;
        tracing::info!(instance = %id, name = %spec.tags.name, "instance requested");
        Ok(id)
    }

    /// Wait for `running`, sleep the settle delay, then read the public address.
    pub async fn await_address(&self, id: &InstanceId) -> Result<IpAddr, DeployError> {
        match tokio::time::timeout(self.launch_timeout, self.compute.wait_until_running(id)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(ComputeError::WaitFailed(reason))) => {
                return Err(DeployError::WaitTimeout {
                    instance: id.clone(),
                    reason,
                });
            }
            Ok(Err(e)) => return Err(DeployError::LaunchError(e.to_string())),
            Err(_) => {
                return Err(DeployError::WaitTimeout {
                    instance: id.clone(),
                    reason: format!("still not running after {:?}", self.launch_timeout),
                });
            }
        }

        tracing::info!(instance = %id, settle = ?self.settle_delay, "instance running, settling");
        self.clock.sleep(self.settle_delay).await;

        let instance = self
            .compute
            .describe_instance(id)
            .await
            .map_err(|e| DeployError::LaunchError(e.to_string()))?
            .ok_or_else(|| DeployError::WaitTimeout {
                instance: id.clone(),
                reason: "instance disappeared after reporting running".to_string(),
            })?;

        if instance.state != InstanceState::Running {
            return Err(DeployError::WaitTimeout {
                instance: id.clone(),
                reason: format!("instance is {} after settling", instance.state),
            });
        }

        instance
            .public_ip
            .ok_or_else(|| DeployError::AddressUnavailable(id.clone()))
    }
}
