// ABOUTME: Per-run record of stage outcomes, terminal status, and cleanup result.
// ABOUTME: Serialized to run-report.json and mapped to the process exit code.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::error::{DeployError, ErrorClass};
use super::logs::LogReport;
use super::outputs::InfrastructureOutputs;
use super::remote::DeployResult;
use super::run::DeploymentRun;
use super::teardown::CleanupOutcome;
use crate::diagnostics::Warning;
use crate::types::{EnvironmentName, InstanceId};

pub const REPORT_FILE: &str = "run-report.json";

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Outputs,
    Secret,
    Launch,
    Remote,
    Logs,
    Teardown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Outputs => "outputs",
            Stage::Secret => "secret",
            Stage::Launch => "launch",
            Stage::Remote => "remote",
            Stage::Logs => "logs",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum StageOutcome {
    Succeeded,
    /// Completed, but something best-effort did not work.
    Warning { message: String },
    Failed { class: ErrorClass, message: String },
    Interrupted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    Unknown,
}

/// Terminal status of a run, independent of cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RunStatus {
    Deployed {
        health: HealthStatus,
    },
    Failed {
        stage: Stage,
        class: ErrorClass,
        message: String,
    },
    Interrupted {
        stage: Stage,
        reason: String,
    },
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Deployed {
                health: HealthStatus::Healthy,
            } => write!(f, "deployed"),
            RunStatus::Deployed {
                health: HealthStatus::Unknown,
            } => write!(f, "deployed, health unknown"),
            RunStatus::Failed {
                stage,
                class,
                message,
            } => write!(f, "failed at {stage} ({class}): {message}"),
            RunStatus::Interrupted { stage, reason } => {
                write!(f, "interrupted during {stage}: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub environment: EnvironmentName,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub operator_host: String,
    pub status: RunStatus,
    pub cleanup: CleanupOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<InfrastructureOutputs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DeployResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogReport>,
    pub stages: Vec<StageRecord>,
    pub warnings: Vec<Warning>,
    #[serde(skip)]
    current: Option<(Stage, Instant)>,
}

impl RunReport {
    pub fn new(run: &DeploymentRun, operator_host: impl Into<String>) -> Self {
        Self {
            run_id: run.run_id.clone(),
            environment: run.environment.clone(),
            started_at: run.started_at,
            finished_at: None,
            operator_host: operator_host.into(),
            // Overwritten when the run finishes.
            status: RunStatus::Interrupted {
                stage: Stage::Outputs,
                reason: "run did not finish".to_string(),
            },
            cleanup: CleanupOutcome::NotRequired,
            outputs: None,
            instance_id: None,
            public_ip: None,
            result: None,
            logs: None,
            stages: Vec::new(),
            warnings: Vec::new(),
            current: None,
        }
    }

    pub fn begin(&mut self, stage: Stage) {
        tracing::info!(run = %self.run_id, %stage, "stage started");
        self.current = Some((stage, Instant::now()));
    }

    /// Stage currently running, or the last one started.
    pub fn current_stage(&self) -> Option<Stage> {
        self.current.map(|(stage, _)| stage)
    }

    /// Close the current stage with `outcome`.
    pub fn finish(&mut self, outcome: StageOutcome) {
        let Some((stage, started)) = self.current else {
            return;
        };
        tracing::info!(run = %self.run_id, %stage, ?outcome, "stage finished");
        self.stages.push(StageRecord {
            stage,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    pub fn fail(&mut self, err: &DeployError) {
        self.finish(StageOutcome::Failed {
            class: err.class(),
            message: err.to_string(),
        });
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self.status, RunStatus::Deployed { .. })
    }

    /// 3 when cleanup failed, 0 when deployed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.cleanup.is_failed() {
            3
        } else if self.is_deployed() {
            0
        } else {
            1
        }
    }

    /// Write `run-report.json` into `dir`.
    pub fn write(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
