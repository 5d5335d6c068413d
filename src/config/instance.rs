// ABOUTME: Ephemeral instance launch settings.
// ABOUTME: Image, class, instance profile, user data, SSH login, and wait budgets.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub image_id: String,

    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    /// Instance profile name; `{env}` and `{project}` are substituted.
    #[serde(default = "default_instance_profile")]
    pub instance_profile: String,

    /// Startup script handed to the provider as user data.
    #[serde(default)]
    pub user_data: Option<PathBuf>,

    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Wait applied after the instance reports running, before its address is used.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Upper bound on the provider's wait-until-running.
    #[serde(default = "default_launch_timeout", with = "humantime_serde")]
    pub launch_timeout: Duration,
}

fn default_instance_type() -> String {
    "t3.micro".to_string()
}

fn default_instance_profile() -> String {
    "EC2-DeploymentRole-{env}".to_string()
}

fn default_ssh_user() -> String {
    "ec2-user".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_launch_timeout() -> Duration {
    Duration::from_secs(600)
}

impl InstanceConfig {
    pub fn template() -> Self {
        InstanceConfig {
            image_id: "ami-0123456789abcdef0".to_string(),
            instance_type: default_instance_type(),
            instance_profile: default_instance_profile(),
            user_data: None,
            ssh_user: default_ssh_user(),
            ssh_port: default_ssh_port(),
            settle_delay: default_settle_delay(),
            launch_timeout: default_launch_timeout(),
        }
    }
}

/// Per-environment overrides for [`InstanceConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceOverrides {
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub instance_profile: Option<String>,
    #[serde(default)]
    pub user_data: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub settle_delay: Option<Duration>,
}

impl InstanceConfig {
    pub(crate) fn apply(&mut self, overrides: &InstanceOverrides) {
        if let Some(ref image_id) = overrides.image_id {
            self.image_id = image_id.clone();
        }
        if let Some(ref instance_type) = overrides.instance_type {
            self.instance_type = instance_type.clone();
        }
        if let Some(ref profile) = overrides.instance_profile {
            self.instance_profile = profile.clone();
        }
        if overrides.user_data.is_some() {
            self.user_data = overrides.user_data.clone();
        }
        if let Some(delay) = overrides.settle_delay {
            self.settle_delay = delay;
        }
    }
}
