// ABOUTME: Error types for the deploy pipeline and rollback path.
// ABOUTME: Each variant maps to an ErrorClass so reports can tell stages of failure apart.

use serde::Serialize;
use std::path::PathBuf;

use crate::types::InstanceId;

/// Errors that can occur while running a deployment or rollback.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required output key is absent or empty for the stack.
    #[error("stack {stack} has no value for output {key}")]
    MissingOutput { stack: String, key: &'static str },

    /// The provisioning-result document is unreadable or not an object of objects.
    #[error("malformed outputs document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// The stack is not present in the provisioning-result document.
    #[error("stack {stack} not found in {}", path.display())]
    StackNotFound { path: PathBuf, stack: String },

    /// Key pair name resolved to zero or several identifiers, or no secret exists.
    #[error("key pair lookup failed: {0}")]
    LookupError(String),

    /// The secret store refused to decrypt.
    #[error("access denied while fetching key material: {0}")]
    AccessDenied(String),

    /// The credential file could not be written.
    #[error("failed to write credential to {}: {source}", path.display())]
    CredentialWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The provider rejected the instance request.
    #[error("instance launch rejected: {0}")]
    LaunchError(String),

    /// The instance never reached `running`.
    #[error("instance {instance} did not reach running: {reason}")]
    WaitTimeout {
        instance: InstanceId,
        reason: String,
    },

    /// The instance is running but exposes no public address.
    #[error("instance {0} has no public address")]
    AddressUnavailable(InstanceId),

    /// SSH connection or file copy failed.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The remote deployment command exited non-zero.
    #[error("remote deployment exited with status {exit_code}: {detail}")]
    RemoteCommandError { exit_code: u32, detail: String },

    /// The build artifact was not produced.
    #[error("build artifact missing on instance: {0}")]
    ArtifactMissing(String),

    /// Termination could not be confirmed.
    #[error("failed to confirm termination of {instance}: {reason}")]
    TerminationError {
        instance: InstanceId,
        reason: String,
    },

    /// The (cluster, service) pair does not exist.
    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound { cluster: String, service: String },

    /// No retained revision precedes the active descriptor.
    #[error("no revision precedes {0}")]
    NoPreviousRevision(String),

    /// The scheduler rejected a request.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Failure taxonomy used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// Bad inputs; nothing was created.
    Configuration,
    /// Launch, wait, or address resolution failed.
    Provision,
    /// Could not reach or copy to the instance.
    Transport,
    /// The payload ran and failed, or left no artifact.
    RemoteCommand,
    Teardown,
    Rollback,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Provision => "provision",
            ErrorClass::Transport => "transport",
            ErrorClass::RemoteCommand => "remote-command",
            ErrorClass::Teardown => "teardown",
            ErrorClass::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

impl DeployError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DeployError::MissingOutput { .. }
            | DeployError::MalformedDocument { .. }
            | DeployError::StackNotFound { .. }
            | DeployError::LookupError(_)
            | DeployError::AccessDenied(_)
            | DeployError::CredentialWrite { .. } => ErrorClass::Configuration,
            DeployError::LaunchError(_)
            | DeployError::WaitTimeout { .. }
            | DeployError::AddressUnavailable(_) => ErrorClass::Provision,
            DeployError::TransportError(_) => ErrorClass::Transport,
            DeployError::RemoteCommandError { .. } | DeployError::ArtifactMissing(_) => {
                ErrorClass::RemoteCommand
            }
            DeployError::TerminationError { .. } => ErrorClass::Teardown,
            DeployError::ServiceNotFound { .. }
            | DeployError::NoPreviousRevision(_)
            | DeployError::Scheduler(_) => ErrorClass::Rollback,
        }
    }
}

impl From<crate::ssh::Error> for DeployError {
    fn from(err: crate::ssh::Error) -> Self {
        DeployError::TransportError(err.to_string())
    }
}

impl From<crate::provider::SchedulerError> for DeployError {
    fn from(err: crate::provider::SchedulerError) -> Self {
        DeployError::Scheduler(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        let err = DeployError::MissingOutput {
            stack: "EC2DeploymentStack-dev".to_string(),
            key: "SubnetId",
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
        assert_eq!(
            err.to_string(),
            "stack EC2DeploymentStack-dev has no value for output SubnetId"
        );
    }

    #[test]
    fn artifact_missing_is_a_remote_command_failure() {
        let err = DeployError::ArtifactMissing("./app/build/libs/project.jar".to_string());
        assert_eq!(err.class(), ErrorClass::RemoteCommand);
    }

    #[test]
    fn ssh_errors_become_transport_errors() {
        let err: DeployError = crate::ssh::Error::ChannelClosed.into();
        assert_eq!(err.class(), ErrorClass::Transport);
    }

    #[test]
    fn class_serializes_kebab_case() {
        let json = serde_json::to_string(&ErrorClass::RemoteCommand).unwrap();
        assert_eq!(json, "\"remote-command\"");
    }
}
