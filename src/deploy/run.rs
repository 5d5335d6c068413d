// ABOUTME: One pipeline invocation: run identity, private per-run state, and the stage sequence.
// ABOUTME: Log collection and teardown run after success, failure, cancellation, or panic.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::FusedFuture;
use std::future::Future;
use std::net::IpAddr;
use std::os::unix::fs::DirBuilderExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use super::DeployError;
use super::health::HealthProbe;
use super::launch::InstanceLauncher;
use super::logs::LogCollector;
use super::outputs::{InfrastructureOutputs, read_outputs};
use super::remote::{Connector, RemoteExecutor};
use super::report::{HealthStatus, RunReport, RunStatus, Stage, StageOutcome};
use super::secrets::SecretResolver;
use super::settings::DeploySettings;
use super::teardown::{CleanupOutcome, TeardownGuarantor};
use crate::diagnostics::{Diagnostics, Warning};
use crate::provider::{ComputeOps, KeyPairOps, SecretStore};
use crate::types::{EnvironmentName, InstanceId};
use crate::wait::Clock;

const CREDENTIAL_FILE: &str = "id_key.pem";
const KNOWN_HOSTS_FILE: &str = "known_hosts";
const CANCELLED: &str = "cancelled by caller";

/// Identity of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRun {
    pub environment: EnvironmentName,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl DeploymentRun {
    /// `base` defaults to the start timestamp; the environment is always appended
    /// so concurrent runs never share an id.
    pub fn new(environment: EnvironmentName, base: Option<&str>) -> Self {
        let started_at = Utc::now();
        let base = base
            .map(str::to_string)
            .unwrap_or_else(|| started_at.format("%Y%m%d%H%M%S").to_string());
        Self {
            run_id: format!("{}-{}", base, environment),
            environment,
            started_at,
        }
    }
}

/// Ownership of a launched instance until teardown confirms it is gone.
#[must_use = "an instance lease must be released after teardown"]
#[derive(Debug)]
pub struct InstanceLease {
    id: InstanceId,
    released: bool,
}

impl InstanceLease {
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            released: false,
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn release(mut self) {
        self.released = true;
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(
                instance = %self.id,
                "instance lease dropped without confirmed teardown; the instance may still be running"
            );
        }
    }
}

/// Private state of one run: work directory, credential, known_hosts, logs.
#[derive(Debug)]
pub struct RunContext {
    run: DeploymentRun,
    work_dir: PathBuf,
    log_dir: PathBuf,
    lease: Option<InstanceLease>,
    address: Option<IpAddr>,
    closed: bool,
}

impl RunContext {
    /// Create `<work_root>/<run_id>` (owner-only) and `<logs_root>/<run_id>`.
    pub fn create(run: DeploymentRun, work_root: &Path, logs_root: &Path) -> std::io::Result<Self> {
        let work_dir = work_root.join(&run.run_id);
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&work_dir)?;

        let log_dir = logs_root.join(&run.run_id);
        std::fs::create_dir_all(&log_dir)?;

        Ok(Self {
            run,
            work_dir,
            log_dir,
            lease: None,
            address: None,
            closed: false,
        })
    }

    pub fn run(&self) -> &DeploymentRun {
        &self.run
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn credential_path(&self) -> PathBuf {
        self.work_dir.join(CREDENTIAL_FILE)
    }

    pub fn known_hosts_path(&self) -> PathBuf {
        self.work_dir.join(KNOWN_HOSTS_FILE)
    }

    /// Take ownership of a freshly launched instance.
    pub fn lease(&mut self, id: InstanceId) {
        if let Some(previous) = self.lease.replace(InstanceLease::new(id)) {
            tracing::error!(instance = %previous.id(), "run context already held a lease");
        }
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.lease.as_ref().map(InstanceLease::id)
    }

    pub fn take_lease(&mut self) -> Option<InstanceLease> {
        self.lease.take()
    }

    pub fn set_address(&mut self, address: IpAddr) {
        self.address = Some(address);
    }

    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    /// Delete the credential, known_hosts and work directory.
    pub fn close(mut self) -> std::io::Result<()> {
        self.closed = true;
        self.remove_private_files()
    }

    fn remove_private_files(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.work_dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.remove_private_files() {
            tracing::warn!(dir = %self.work_dir.display(), "failed to remove run work directory: {}", e);
        }
    }
}

/// External systems one run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub compute: &'a dyn ComputeOps,
    pub key_pairs: &'a dyn KeyPairOps,
    pub secrets: &'a dyn SecretStore,
    pub connector: &'a dyn Connector,
    pub probe: &'a dyn HealthProbe,
    pub clock: &'a dyn Clock,
}

enum BodyOutcome {
    Completed { healthy: bool },
    Failed(DeployError),
    Interrupted(String),
}

/// The deploy pipeline for one environment.
pub struct Pipeline<'a> {
    settings: &'a DeploySettings,
    deps: Collaborators<'a>,
    operator_host: String,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a DeploySettings, deps: Collaborators<'a>) -> Self {
        Self {
            settings,
            deps,
            operator_host: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    /// Execute every stage. `shutdown` resolving cancels the in-flight stage;
    /// log collection and teardown still run afterwards.
    ///
    /// Only failing to create the run's directories is an `Err`; every other
    /// failure is recorded in the returned report.
    pub async fn run<F>(&self, run: DeploymentRun, shutdown: F) -> std::io::Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let mut ctx = RunContext::create(run, &self.settings.work_dir, &self.settings.logs_dir)?;
        let mut report = RunReport::new(ctx.run(), &self.operator_host);
        let mut diag = Diagnostics::default();

        tracing::info!(
            run = %report.run_id,
            environment = %report.environment,
            stack = %self.settings.stack,
            "deployment run started"
        );

        let shutdown = shutdown.fuse();
        let shutdown = std::pin::pin!(shutdown);
        let outcome = self.execute(&mut ctx, &mut report, &mut diag, shutdown).await;

        let stage = report.current_stage().unwrap_or(Stage::Outputs);
        report.status = match outcome {
            BodyOutcome::Completed { healthy } => RunStatus::Deployed {
                health: if healthy {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unknown
                },
            },
            BodyOutcome::Failed(e) => {
                tracing::error!(run = %report.run_id, %stage, class = %e.class(), "run failed: {}", e);
                report.fail(&e);
                RunStatus::Failed {
                    stage,
                    class: e.class(),
                    message: e.to_string(),
                }
            }
            BodyOutcome::Interrupted(reason) => {
                tracing::warn!(run = %report.run_id, %stage, "run interrupted: {}", reason);
                report.finish(StageOutcome::Interrupted {
                    reason: reason.clone(),
                });
                RunStatus::Interrupted { stage, reason }
            }
        };

        self.finalize(&mut ctx, &mut report, &mut diag).await;

        let log_dir = ctx.log_dir().to_path_buf();
        if let Err(e) = ctx.close() {
            diag.warn(Warning::credential_cleanup(format!(
                "failed to remove run credential: {}",
                e
            )));
        }

        report.warnings = diag.into_warnings();
        report.finished_at = Some(Utc::now());
        match report.write(&log_dir) {
            Ok(path) => tracing::info!(path = %path.display(), "run report written"),
            Err(e) => tracing::warn!(dir = %log_dir.display(), "failed to write run report: {}", e),
        }

        tracing::info!(run = %report.run_id, status = %report.status, "deployment run finished");
        Ok(report)
    }

    /// Outputs through remote execution, cancellable between and within stages
    /// except while the launch request is in flight.
    async fn execute<S>(
        &self,
        ctx: &mut RunContext,
        report: &mut RunReport,
        diag: &mut Diagnostics,
        mut shutdown: Pin<&mut S>,
    ) -> BodyOutcome
    where
        S: FusedFuture<Output = ()>,
    {
        let outputs = match guarded(self.prepare(ctx, report), shutdown.as_mut()).await {
            Ok(outputs) => outputs,
            Err(outcome) => return outcome,
        };

        report.begin(Stage::Launch);
        let launcher = InstanceLauncher::new(
            self.deps.compute,
            self.deps.clock,
            self.settings.settle_delay,
            self.settings.launch_timeout,
        );

        // The provider may create the instance before answering, so the request
        // runs to completion and the lease is taken before cancellation is honoured.
        let spec = self.settings.launch.to_spec(&outputs);
        let request = AssertUnwindSafe(launcher.request(&spec)).catch_unwind();
        let mut request = std::pin::pin!(request);
        let mut cancelled = false;
        let requested = loop {
            tokio::select! {
                result = &mut request => break result,
                _ = shutdown.as_mut(), if !cancelled => {
                    tracing::warn!(run = %report.run_id, "cancellation requested while the launch request is in flight");
                    cancelled = true;
                }
            }
        };
        let id = match requested {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return BodyOutcome::Failed(e),
            Err(panic) => return BodyOutcome::Interrupted(panic_reason(&*panic)),
        };
        ctx.lease(id.clone());
        report.instance_id = Some(id.clone());
        if cancelled {
            return BodyOutcome::Interrupted(CANCELLED.to_string());
        }

        let provisioned = async {
            let address = launcher.await_address(&id).await?;
            ctx.set_address(address);
            report.public_ip = Some(address);
            report.finish(StageOutcome::Succeeded);
            self.execute_remote(ctx, report, diag, address).await
        };
        match guarded(provisioned, shutdown).await {
            Ok(healthy) => BodyOutcome::Completed { healthy },
            Err(outcome) => outcome,
        }
    }

    /// Stack outputs and the run credential.
    async fn prepare(
        &self,
        ctx: &mut RunContext,
        report: &mut RunReport,
    ) -> Result<InfrastructureOutputs, DeployError> {
        let s = self.settings;

        report.begin(Stage::Outputs);
        let outputs = read_outputs(&s.outputs_file, &s.stack)?;
        report.outputs = Some(outputs.clone());
        report.finish(StageOutcome::Succeeded);

        report.begin(Stage::Secret);
        let material = SecretResolver::new(self.deps.key_pairs, self.deps.secrets)
            .resolve(&outputs.key_pair_name)
            .await?;
        material.write_to(&ctx.credential_path())?;
        drop(material);
        report.finish(StageOutcome::Succeeded);

        Ok(outputs)
    }

    /// Upload and run the payload. Returns whether the application answered healthy.
    async fn execute_remote(
        &self,
        ctx: &RunContext,
        report: &mut RunReport,
        diag: &mut Diagnostics,
        address: IpAddr,
    ) -> Result<bool, DeployError> {
        let s = self.settings;

        report.begin(Stage::Remote);
        let host = self
            .deps
            .connector
            .connect(address, &ctx.credential_path(), &ctx.known_hosts_path())
            .await?;
        let executor = RemoteExecutor {
            payload: &s.payload,
            artifact: &s.artifact,
            probe: self.deps.probe,
            clock: self.deps.clock,
            health_policy: s.health_policy,
            health_paths: &s.health_paths,
        };
        let executed = executor.execute(host.as_ref(), address, &s.request).await;
        if let Err(e) = host.disconnect().await {
            diag.warn(Warning::ssh_disconnect(format!(
                "SSH disconnect from {} failed: {}",
                address, e
            )));
        }
        let (result, health) = executed?;
        report.result = Some(result.clone());

        if health.healthy {
            report.finish(StageOutcome::Succeeded);
        } else {
            let message = format!(
                "no healthy response after {} attempts{}",
                health.attempts,
                health
                    .last_error
                    .map(|e| format!(" (last: {e})"))
                    .unwrap_or_default()
            );
            diag.warn(Warning::health_unknown(message.clone()));
            report.finish(StageOutcome::Warning { message });
        }

        Ok(result.health_ok)
    }

    /// Log collection then teardown. Never skipped, never raises.
    async fn finalize(&self, ctx: &mut RunContext, report: &mut RunReport, diag: &mut Diagnostics) {
        report.begin(Stage::Logs);
        let logs = LogCollector::new(self.deps.connector, self.settings.payload.log_path())
            .collect(
                ctx.address(),
                &ctx.credential_path(),
                &ctx.known_hosts_path(),
                ctx.log_dir(),
            )
            .await;
        let unavailable = logs.unavailable_reasons();
        if unavailable.is_empty() {
            report.finish(StageOutcome::Succeeded);
        } else {
            for reason in &unavailable {
                diag.warn(Warning::log_unavailable(reason.clone()));
            }
            report.finish(StageOutcome::Warning {
                message: unavailable.join("; "),
            });
        }
        report.logs = Some(logs);

        report.begin(Stage::Teardown);
        let lease = ctx.take_lease();
        let guarantor = TeardownGuarantor::new(self.deps.compute);
        match guarantor.teardown(lease.as_ref().map(InstanceLease::id)).await {
            Ok(outcome) => {
                if let Some(lease) = lease {
                    lease.release();
                }
                report.cleanup = outcome;
                report.finish(StageOutcome::Succeeded);
            }
            Err(e) => {
                tracing::error!(run = %report.run_id, "teardown failed: {}", e);
                report.cleanup = CleanupOutcome::Failed {
                    message: e.to_string(),
                };
                report.fail(&e);
                // Dropping the unreleased lease logs the leaked instance id.
                drop(lease);
            }
        }
    }
}

/// Race `body` against `shutdown`, turning panics into interruptions.
async fn guarded<T, B, S>(body: B, shutdown: Pin<&mut S>) -> Result<T, BodyOutcome>
where
    B: Future<Output = Result<T, DeployError>>,
    S: FusedFuture<Output = ()>,
{
    let body = AssertUnwindSafe(body).catch_unwind();
    tokio::select! {
        biased;
        _ = shutdown => Err(BodyOutcome::Interrupted(CANCELLED.to_string())),
        result = body => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(BodyOutcome::Failed(e)),
            Err(panic) => Err(BodyOutcome::Interrupted(panic_reason(&*panic))),
        },
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    format!("panic: {}", panic_message(panic))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
