// ABOUTME: Compute provider operations for ephemeral instances.
// ABOUTME: Launch, describe, wait, and terminate instances by id.

use crate::types::{InstanceId, SecurityGroupId, SubnetId};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Instance lifecycle operations.
#[async_trait]
pub trait ComputeOps: Send + Sync {
    /// Request a new instance. Returns as soon as the provider assigned an id.
    async fn launch_instance(&self, spec: &LaunchSpec) -> Result<InstanceId, ComputeError>;

    /// Block until the instance reports `running` (provider-bounded).
    async fn wait_until_running(&self, id: &InstanceId) -> Result<(), ComputeError>;

    /// Current view of an instance; `None` when the provider does not know the id.
    async fn describe_instance(&self, id: &InstanceId) -> Result<Option<Instance>, ComputeError>;

    /// Request termination.
    async fn terminate_instance(&self, id: &InstanceId) -> Result<(), ComputeError>;

    /// Block until the instance reports `terminated` (provider-bounded).
    async fn wait_until_terminated(&self, id: &InstanceId) -> Result<(), ComputeError>;
}

/// Everything needed to request one ephemeral instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image_id: String,
    pub instance_type: String,
    pub key_name: String,
    pub security_group_id: SecurityGroupId,
    pub subnet_id: SubnetId,
    pub instance_profile: String,
    /// Startup payload passed as user data.
    pub user_data: Option<String>,
    pub tags: InstanceTags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTags {
    pub name: String,
    pub environment: String,
    pub project: String,
    pub auto_shutdown: bool,
}

impl InstanceTags {
    /// Tags as key/value pairs, in the order they are sent to the provider.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Name", self.name.clone()),
            ("Environment", self.environment.clone()),
            ("Project", self.project.clone()),
            ("AutoShutdown", self.auto_shutdown.to_string()),
        ]
    }
}

/// Provider view of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: InstanceId,
    pub public_ip: Option<IpAddr>,
    pub state: InstanceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InstanceState::Pending),
            "running" => Some(InstanceState::Running),
            "shutting-down" => Some(InstanceState::ShuttingDown),
            "terminated" => Some(InstanceState::Terminated),
            "stopping" => Some(InstanceState::Stopping),
            "stopped" => Some(InstanceState::Stopped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from compute operations.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("launch rejected: {0}")]
    Rejected(String),

    #[error("wait failed: {0}")]
    WaitFailed(String),

    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("provider error: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_provider_names() {
        for name in ["pending", "running", "shutting-down", "terminated", "stopping", "stopped"] {
            let state = InstanceState::parse(name).expect("known state");
            assert_eq!(state.as_str(), name);
        }
        assert_eq!(InstanceState::parse("rebooting"), None);
    }

    #[test]
    fn tags_include_auto_shutdown_flag() {
        let tags = InstanceTags {
            name: "app-deploy-dev".to_string(),
            environment: "dev".to_string(),
            project: "app".to_string(),
            auto_shutdown: true,
        };
        assert!(tags.pairs().contains(&("AutoShutdown", "true".to_string())));
        assert_eq!(tags.pairs()[1], ("Environment", "dev".to_string()));
    }
}
