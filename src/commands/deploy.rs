// ABOUTME: Deploy command implementation.
// ABOUTME: Prepares every environment up front, then runs their pipelines concurrently.

use super::{load_config, provider};
use ephemeron::deploy::{
    Collaborators, DeploySettings, DeploymentRun, HttpProbe, Pipeline, RunReport, SshConnector,
};
use ephemeron::error::Result;
use ephemeron::output::Output;
use ephemeron::provider::aws::AwsCli;
use ephemeron::types::EnvironmentName;
use ephemeron::wait::TokioClock;
use futures::FutureExt;
use futures::future::join_all;
use std::future::Future;
use std::path::Path;

/// Everything one environment's run needs, resolved before any cloud call.
struct Prepared {
    environment: EnvironmentName,
    settings: DeploySettings,
    aws: AwsCli,
    connector: SshConnector,
    probe: HttpProbe,
}

fn prepare(config_path: Option<&Path>, environment: &EnvironmentName) -> Result<Prepared> {
    let config = load_config(config_path, environment)?;
    Ok(Prepared {
        environment: environment.clone(),
        settings: DeploySettings::from_config(&config, environment)?,
        aws: provider(&config)?,
        connector: SshConnector::new(&config.instance.ssh_user, config.instance.ssh_port),
        probe: HttpProbe::new(config.healthcheck.probe_timeout),
    })
}

/// Resolves once `signal` fires. A listener that cannot be installed never resolves.
async fn interrupted<F, E>(signal: F)
where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    match signal.await {
        Ok(()) => tracing::warn!("interrupt received, cancelling runs"),
        Err(e) => {
            tracing::warn!("cannot listen for interrupts, runs are not cancellable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Deploy every environment; returns the process exit code.
pub async fn deploy(
    config_path: Option<&Path>,
    environments: &[EnvironmentName],
    run_id: Option<&str>,
    mut output: Output,
) -> Result<i32> {
    let prepared = environments
        .iter()
        .map(|env| prepare(config_path, env))
        .collect::<Result<Vec<_>>>()?;

    output.start_timer();
    let clock = TokioClock::new();

    // One Ctrl-C interrupts every run; each still collects logs and tears down.
    let shutdown = interrupted(tokio::signal::ctrl_c()).boxed().shared();

    let runs = prepared.iter().map(|p| {
        let deps = Collaborators {
            compute: &p.aws,
            key_pairs: &p.aws,
            secrets: &p.aws,
            connector: &p.connector,
            probe: &p.probe,
            clock: &clock,
        };
        let shutdown = shutdown.clone();
        output.progress(&format!(
            "→ Deploying {} (stack {})",
            p.environment, p.settings.stack
        ));
        async move {
            let pipeline = Pipeline::new(&p.settings, deps);
            let run = DeploymentRun::new(p.environment.clone(), run_id);
            (&p.environment, pipeline.run(run, shutdown).await)
        }
    });

    let mut exit_code = 0;
    for (environment, result) in join_all(runs).await {
        let code = match result {
            Ok(report) => {
                print_report(&output, &report);
                report.exit_code()
            }
            Err(e) => {
                output.error(&format!("{environment}: could not start run: {e}"));
                2
            }
        };
        exit_code = exit_code.max(code);
    }

    Ok(exit_code)
}

fn print_report(output: &Output, report: &RunReport) {
    for warning in &report.warnings {
        output.warning(&format!("{}: {}", report.environment, warning.message));
    }

    let instance = report
        .instance_id
        .as_ref()
        .map(|id| format!(", instance {id}"))
        .unwrap_or_default();
    let summary = format!(
        "{}: {} (run {}{}, cleanup: {})",
        report.environment,
        report.status,
        report.run_id,
        instance,
        cleanup_label(report)
    );

    match report.exit_code() {
        0 => output.success(&format!("✓ {summary}")),
        _ => output.error(&summary),
    }
    output.data("run", report);
}

fn cleanup_label(report: &RunReport) -> String {
    use ephemeron::deploy::CleanupOutcome;
    match &report.cleanup {
        CleanupOutcome::NotRequired => "not required".to_string(),
        CleanupOutcome::Terminated => "terminated".to_string(),
        CleanupOutcome::AlreadyGone => "already gone".to_string(),
        CleanupOutcome::Failed { message } => format!("FAILED, {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn failed_listener_never_cancels() {
        let signal = async { Err::<(), _>(std::io::Error::other("no signal driver")) };
        tokio::select! {
            _ = interrupted(signal) => panic!("a failed listener must not cancel runs"),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
        }
    }

    #[tokio::test]
    async fn delivered_signal_cancels() {
        interrupted(async { Ok::<(), std::io::Error>(()) }).await;
    }
}
