// ABOUTME: Rollback of the persistent service, independent of the ephemeral pipeline.
// ABOUTME: Restart-in-place by default; previous-revision moves the service one descriptor back.

use serde::Serialize;

use super::DeployError;
use crate::provider::{DescriptorRevision, SchedulerOps};
use crate::types::EnvironmentName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackRequest {
    pub cluster: String,
    pub service: String,
    pub environment: EnvironmentName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackMode {
    /// Force a fresh deployment of the active descriptor.
    RestartInPlace,
    /// Point the service at the revision before the active one.
    PreviousRevision,
}

impl std::fmt::Display for RollbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackMode::RestartInPlace => f.write_str("restart-in-place"),
            RollbackMode::PreviousRevision => f.write_str("previous-revision"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    #[serde(flatten)]
    pub request: RollbackRequest,
    pub mode: RollbackMode,
    /// Descriptor active before the rollback.
    pub from: String,
    /// Descriptor the service now runs.
    pub to: String,
}

/// Roll back `request` with `mode`.
///
/// A missing cluster or service fails before anything is changed.
pub async fn rollback(
    scheduler: &dyn SchedulerOps,
    request: RollbackRequest,
    mode: RollbackMode,
) -> Result<RollbackReport, DeployError> {
    let active = scheduler
        .describe_service(&request.cluster, &request.service)
        .await?
        .ok_or_else(|| DeployError::ServiceNotFound {
            cluster: request.cluster.clone(),
            service: request.service.clone(),
        })?;

    tracing::info!(
        cluster = %request.cluster,
        service = %request.service,
        descriptor = %active.descriptor,
        %mode,
        "rolling back service"
    );

    let to = match mode {
        RollbackMode::RestartInPlace => {
            scheduler
                .force_redeploy(&request.cluster, &request.service)
                .await?;
            active.descriptor.clone()
        }
        RollbackMode::PreviousRevision => {
            let current = active
                .revision()
                .ok_or_else(|| DeployError::NoPreviousRevision(active.descriptor.clone()))?;
            let revisions = scheduler.list_revisions(&current.family).await?;
            let previous = previous_revision(&current, &revisions)
                .ok_or_else(|| DeployError::NoPreviousRevision(active.descriptor.clone()))?;

            scheduler
                .update_descriptor(&request.cluster, &request.service, &previous)
                .await?;
            previous
        }
    };

    Ok(RollbackReport {
        request,
        mode,
        from: active.descriptor,
        to,
    })
}

/// Highest retained revision of the same family below `current`.
fn previous_revision(current: &DescriptorRevision, revisions: &[String]) -> Option<String> {
    revisions
        .iter()
        .filter_map(|r| DescriptorRevision::parse(r).map(|parsed| (parsed, r)))
        .filter(|(parsed, _)| parsed.family == current.family && parsed.revision < current.revision)
        .max_by_key(|(parsed, _)| parsed.revision)
        .map(|(_, r)| r.clone())
}
