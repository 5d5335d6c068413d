// ABOUTME: Rollback command implementation.
// ABOUTME: Restarts the environment's persistent service, or moves it to its previous revision.

use super::{load_config, provider};
use ephemeron::deploy::{RollbackMode, RollbackRequest, rollback as rollback_service};
use ephemeron::error::Result;
use ephemeron::output::Output;
use ephemeron::types::EnvironmentName;
use std::path::Path;

/// Returns the process exit code.
pub async fn rollback(
    config_path: Option<&Path>,
    environment: &EnvironmentName,
    previous: bool,
    mut output: Output,
) -> Result<i32> {
    let config = load_config(config_path, environment)?;
    let aws = provider(&config)?;

    let request = RollbackRequest {
        cluster: config.cluster_name(environment),
        service: config.service_name(environment),
        environment: environment.clone(),
    };
    let mode = if previous {
        RollbackMode::PreviousRevision
    } else {
        RollbackMode::RestartInPlace
    };

    output.start_timer();
    output.progress(&format!(
        "→ Rolling back {} in {} ({mode})",
        request.service, request.cluster
    ));

    match rollback_service(&aws, request, mode).await {
        Ok(report) => {
            if report.mode == RollbackMode::RestartInPlace {
                output.warning(
                    "restart-in-place redeploys the active descriptor; use --previous to change revision",
                );
            }
            output.success(&format!(
                "✓ {} {}: {} → {}",
                report.request.service, report.mode, report.from, report.to
            ));
            output.data("rollback", &report);
            Ok(0)
        }
        Err(e) => {
            output.error(&format!("{} ({})", e, e.class()));
            Ok(1)
        }
    }
}
