// ABOUTME: Status command implementation.
// ABOUTME: Prints the names and settings an environment resolves to, without cloud calls.

use super::load_config;
use ephemeron::config::resolve_optional;
use ephemeron::error::Result;
use ephemeron::output::Output;
use ephemeron::types::EnvironmentName;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct EnvironmentStatus {
    environment: String,
    region: Option<String>,
    outputs_file: String,
    stack: String,
    image_id: String,
    instance_type: String,
    instance_profile: String,
    settle_delay_secs: u64,
    cluster: String,
    service: String,
    logs_dir: String,
}

pub fn status(
    config_path: Option<&Path>,
    environment: &EnvironmentName,
    output: Output,
) -> Result<i32> {
    let config = load_config(config_path, environment)?;

    let status = EnvironmentStatus {
        environment: environment.to_string(),
        region: resolve_optional(config.aws.region.as_ref())?,
        outputs_file: config.outputs.file.display().to_string(),
        stack: config.stack_name(environment),
        image_id: config.instance.image_id.clone(),
        instance_type: config.instance.instance_type.clone(),
        instance_profile: config.instance_profile(environment),
        settle_delay_secs: config.instance.settle_delay.as_secs(),
        cluster: config.cluster_name(environment),
        service: config.service_name(environment),
        logs_dir: config.logs_dir.display().to_string(),
    };

    output.progress(&format!("Project:     {}", config.project));
    output.progress(&format!("Environment: {}", status.environment));
    output.progress(&format!(
        "Region:      {}",
        status.region.as_deref().unwrap_or("(provider default)")
    ));
    output.progress(&format!("Stack:       {} ({})", status.stack, status.outputs_file));
    output.progress(&format!(
        "Instance:    {} {} profile {}",
        status.instance_type, status.image_id, status.instance_profile
    ));
    output.progress(&format!("Rollback:    {} / {}", status.cluster, status.service));
    output.progress(&format!("Logs:        {}", status.logs_dir));
    output.data("status", &status);
    Ok(0)
}
