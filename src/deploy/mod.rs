// ABOUTME: Deployment orchestration for ephemeral instances plus the service rollback path.
// ABOUTME: Outputs, secret, launch, remote execution, log collection, and guaranteed teardown.

mod error;
mod health;
mod launch;
mod logs;
mod outputs;
mod remote;
mod report;
mod rollback;
mod run;
mod secrets;
mod settings;
mod teardown;

pub use error::{DeployError, ErrorClass};
pub use health::{HealthProbe, HealthReport, HttpProbe, wait_healthy};
pub use launch::{InstanceLauncher, LaunchTemplate};
pub use logs::{CLOUD_INIT_LOCAL, DEPLOYMENT_LOCAL, LogCollector, LogReport, LogStatus};
pub use outputs::{InfrastructureOutputs, extract_outputs, read_outputs};
pub use remote::{
    Connector, DeployResult, Payload, PayloadFile, PayloadRequest, REMOTE_LOG, RemoteExecutor,
    RemoteHost, SshConnector, shell_quote,
};
pub use report::{
    HealthStatus, REPORT_FILE, RunReport, RunStatus, Stage, StageOutcome, StageRecord,
};
pub use rollback::{RollbackMode, RollbackReport, RollbackRequest, rollback};
pub use run::{Collaborators, DeploymentRun, InstanceLease, Pipeline, RunContext};
pub use secrets::{SecretMaterial, SecretResolver};
pub use settings::DeploySettings;
pub use teardown::{CleanupOutcome, TeardownGuarantor};
