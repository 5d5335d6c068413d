// ABOUTME: Persistent service scheduler operations for the rollback path.
// ABOUTME: Describe a service, force a redeploy, and move it between descriptor revisions.

use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait SchedulerOps: Send + Sync {
    /// Active descriptor of a service; `None` when the cluster or service does not exist.
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceDescriptor>, SchedulerError>;

    /// Restart the service's tasks using its current descriptor.
    async fn force_redeploy(&self, cluster: &str, service: &str) -> Result<(), SchedulerError>;

    /// Descriptor revisions retained for a family, newest first.
    async fn list_revisions(&self, family: &str) -> Result<Vec<String>, SchedulerError>;

    /// Point the service at a different descriptor.
    async fn update_descriptor(
        &self,
        cluster: &str,
        service: &str,
        descriptor: &str,
    ) -> Result<(), SchedulerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub cluster: String,
    pub service: String,
    /// Full descriptor reference, e.g. `arn:...:task-definition/java-app:12`.
    pub descriptor: String,
    pub desired_count: u32,
    pub running_count: u32,
}

impl ServiceDescriptor {
    pub fn revision(&self) -> Option<DescriptorRevision> {
        DescriptorRevision::parse(&self.descriptor)
    }
}

/// `family:revision` part of a descriptor reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorRevision {
    pub family: String,
    pub revision: u32,
}

impl DescriptorRevision {
    /// Parse `family:N` or any reference ending in `/family:N`.
    pub fn parse(reference: &str) -> Option<Self> {
        let tail = reference.rsplit('/').next()?;
        let (family, revision) = tail.rsplit_once(':')?;
        if family.is_empty() {
            return None;
        }
        Some(Self {
            family: family.to_string(),
            revision: revision.parse().ok()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("provider error: {0}")]
    Provider(String),
}
