// ABOUTME: Best-effort retrieval of instance diagnostics into the run's log directory.
// ABOUTME: Never fails the run; anything that cannot be fetched is recorded as unavailable.

use serde::Serialize;
use std::net::IpAddr;
use std::path::Path;

use super::remote::{Connector, RemoteHost};

pub const CLOUD_INIT_LOCAL: &str = "cloud-init.log";
pub const DEPLOYMENT_LOCAL: &str = "deployment.log";
const CLOUD_INIT_REMOTE: &str = "/var/log/cloud-init-output.log";

/// What happened to one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum LogStatus {
    Collected { bytes: usize },
    Unavailable { reason: String },
}

impl LogStatus {
    pub fn is_collected(&self) -> bool {
        matches!(self, LogStatus::Collected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogReport {
    pub cloud_init: LogStatus,
    pub deployment: LogStatus,
}

impl LogReport {
    /// Both files unavailable for the same reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            cloud_init: LogStatus::Unavailable {
                reason: reason.clone(),
            },
            deployment: LogStatus::Unavailable { reason },
        }
    }

    pub fn unavailable_reasons(&self) -> Vec<String> {
        [
            (CLOUD_INIT_LOCAL, &self.cloud_init),
            (DEPLOYMENT_LOCAL, &self.deployment),
        ]
        .into_iter()
        .filter_map(|(name, status)| match status {
            LogStatus::Unavailable { reason } => Some(format!("{name}: {reason}")),
            LogStatus::Collected { .. } => None,
        })
        .collect()
    }
}

pub struct LogCollector<'a> {
    connector: &'a dyn Connector,
    /// Remote deployment log, relative to the login user's home.
    deployment_log: String,
}

impl<'a> LogCollector<'a> {
    pub fn new(connector: &'a dyn Connector, deployment_log: impl Into<String>) -> Self {
        Self {
            connector,
            deployment_log: deployment_log.into(),
        }
    }

    /// Fetch both logs into `dest`. Local files are always written.
    pub async fn collect(
        &self,
        address: Option<IpAddr>,
        credential: &Path,
        known_hosts: &Path,
        dest: &Path,
    ) -> LogReport {
        let report = match address {
            None => LogReport::unavailable("no instance address was resolved"),
            Some(address) => match self.connector.connect(address, credential, known_hosts).await
            {
                Ok(host) => {
                    let report = LogReport {
                        cloud_init: fetch(
                            host.as_ref(),
                            &format!("sudo cat {}", CLOUD_INIT_REMOTE),
                            &dest.join(CLOUD_INIT_LOCAL),
                        )
                        .await,
                        deployment: fetch(
                            host.as_ref(),
                            &format!("cat {}", self.deployment_log),
                            &dest.join(DEPLOYMENT_LOCAL),
                        )
                        .await,
                    };
                    if let Err(e) = host.disconnect().await {
                        tracing::debug!("log collection disconnect failed: {}", e);
                    }
                    return report;
                }
                Err(e) => LogReport::unavailable(format!("connection failed: {}", e)),
            },
        };

        for (name, status) in [
            (CLOUD_INIT_LOCAL, &report.cloud_init),
            (DEPLOYMENT_LOCAL, &report.deployment),
        ] {
            if let LogStatus::Unavailable { reason } = status {
                write_marker(&dest.join(name), reason);
            }
        }
        report
    }
}

async fn fetch(host: &dyn RemoteHost, command: &str, local: &Path) -> LogStatus {
    let status = match host.exec(command).await {
        Ok(output) if output.success() => match std::fs::write(local, output.stdout.as_bytes()) {
            Ok(()) => {
                return LogStatus::Collected {
                    bytes: output.stdout.len(),
                };
            }
            Err(e) => LogStatus::Unavailable {
                reason: format!("failed to write {}: {}", local.display(), e),
            },
        },
        Ok(output) => LogStatus::Unavailable {
            reason: match output.stderr.trim() {
                "" => format!("remote read exited with status {}", output.exit_code),
                stderr => stderr.to_string(),
            },
        },
        Err(e) => LogStatus::Unavailable {
            reason: e.to_string(),
        },
    };

    if let LogStatus::Unavailable { ref reason } = status {
        tracing::warn!(file = %local.display(), %reason, "log unavailable");
        write_marker(local, reason);
    }
    status
}

fn write_marker(path: &Path, reason: &str) {
    if let Err(e) = std::fs::write(path, format!("unavailable: {reason}\n")) {
        tracing::warn!(file = %path.display(), "failed to write log marker: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_reasons_name_the_file() {
        let report = LogReport {
            cloud_init: LogStatus::Collected { bytes: 10 },
            deployment: LogStatus::Unavailable {
                reason: "No such file".to_string(),
            },
        };
        assert_eq!(
            report.unavailable_reasons(),
            vec!["deployment.log: No such file".to_string()]
        );
    }

    #[test]
    fn marker_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLOUD_INIT_LOCAL);
        write_marker(&path, "connection refused");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "unavailable: connection refused\n"
        );
    }
}
