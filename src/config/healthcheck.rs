// ABOUTME: HTTP health check configuration for the deployed application.
// ABOUTME: Probes /health then / every 2s for at most 30s unless overridden.

use serde::Deserialize;
use std::time::Duration;

use crate::wait::PollPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    /// Paths probed in order on every attempt; the first 200 wins.
    #[serde(default = "default_paths")]
    pub paths: Vec<String>,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Total budget measured from the first probe.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Budget for a single HTTP request.
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

fn default_paths() -> Vec<String> {
    vec!["/health".to_string(), "/".to_string()]
}

fn default_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

impl HealthcheckConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.interval, self.timeout)
    }
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        HealthcheckConfig {
            paths: default_paths(),
            interval: default_interval(),
            timeout: default_timeout(),
            probe_timeout: default_probe_timeout(),
        }
    }
}
