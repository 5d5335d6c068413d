// ABOUTME: Unconditional termination of the run's instance, with confirmation.
// ABOUTME: Idempotent: absent, unknown, or already-terminated ids are no-op successes.

use serde::Serialize;

use super::DeployError;
use crate::provider::{ComputeError, ComputeOps, InstanceState};
use crate::types::InstanceId;

/// How cleanup ended for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum CleanupOutcome {
    /// No instance was ever created.
    NotRequired,
    /// Termination requested and confirmed.
    Terminated,
    /// The provider no longer knows the instance, or it was already terminated.
    AlreadyGone,
    Failed { message: String },
}

impl CleanupOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CleanupOutcome::Failed { .. })
    }
}

pub struct TeardownGuarantor<'a> {
    compute: &'a dyn ComputeOps,
}

impl<'a> TeardownGuarantor<'a> {
    pub fn new(compute: &'a dyn ComputeOps) -> Self {
        Self { compute }
    }

    /// Terminate `id` and confirm it reached `terminated`.
    pub async fn teardown(&self, id: Option<&InstanceId>) -> Result<CleanupOutcome, DeployError> {
        let Some(id) = id else {
            return Ok(CleanupOutcome::NotRequired);
        };

        let failed = |reason: String| DeployError::TerminationError {
            instance: id.clone(),
            reason,
        };

        match self.compute.describe_instance(id).await {
            Ok(None) => {
                tracing::info!(instance = %id, "instance unknown to provider, nothing to terminate");
                return Ok(CleanupOutcome::AlreadyGone);
            }
            Ok(Some(instance)) if instance.state == InstanceState::Terminated => {
                tracing::info!(instance = %id, "instance already terminated");
                return Ok(CleanupOutcome::AlreadyGone);
            }
            Ok(Some(_)) => {}
            // Still try to terminate; describe may fail while terminate succeeds.
            Err(e) => tracing::warn!(instance = %id, "describe before teardown failed: {}", e),
        }

        match self.compute.terminate_instance(id).await {
            Ok(()) => tracing::info!(instance = %id, "termination requested"),
            Err(ComputeError::NotFound(_)) => return Ok(CleanupOutcome::AlreadyGone),
            Err(e) => return Err(failed(format!("terminate request failed: {}", e))),
        }

        if let Err(e) = self.compute.wait_until_terminated(id).await {
            tracing::warn!(instance = %id, "wait for termination failed: {}", e);
        }

        match self.compute.describe_instance(id).await {
            Ok(Some(instance)) if instance.state == InstanceState::Terminated => {
                tracing::info!(instance = %id, "termination confirmed");
                Ok(CleanupOutcome::Terminated)
            }
            Ok(None) => Ok(CleanupOutcome::Terminated),
            Ok(Some(instance)) => Err(failed(format!(
                "instance is still {} after waiting",
                instance.state
            ))),
            Err(e) => Err(failed(format!("could not confirm state: {}", e))),
        }
    }
}
