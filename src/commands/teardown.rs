// ABOUTME: Teardown command implementation.
// ABOUTME: Terminates a leftover instance by id; safe to repeat.

use super::{load_config, provider};
use ephemeron::deploy::{CleanupOutcome, TeardownGuarantor};
use ephemeron::error::Result;
use ephemeron::output::Output;
use ephemeron::types::{EnvironmentName, InstanceId};
use std::path::Path;

/// Returns the process exit code: 0 when gone, 3 when termination is unconfirmed.
pub async fn teardown(
    config_path: Option<&Path>,
    environment: &EnvironmentName,
    instance: &str,
    mut output: Output,
) -> Result<i32> {
    let config = load_config(config_path, environment)?;
    let aws = provider(&config)?;
    let id = InstanceId::new(instance);

    output.start_timer();
    output.progress(&format!("→ Terminating {id} ({environment})"));

    match TeardownGuarantor::new(&aws).teardown(Some(&id)).await {
        Ok(outcome) => {
            let message = match outcome {
                CleanupOutcome::AlreadyGone => format!("✓ {id} was already gone"),
                _ => format!("✓ {id} terminated"),
            };
            output.success(&message);
            output.data("teardown", &outcome);
            Ok(0)
        }
        Err(e) => {
            output.error(&e.to_string());
            Ok(3)
        }
    }
}
