// ABOUTME: Scheduler binding through `aws ecs`.
// ABOUTME: describe-services, update-service, and list-task-definitions for the rollback path.

use async_trait::async_trait;
use serde::Deserialize;

use super::{AwsCli, CliError};
use crate::provider::{SchedulerError, SchedulerOps, ServiceDescriptor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeServicesOutput {
    #[serde(default)]
    services: Vec<DescribedService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribedService {
    service_name: String,
    #[serde(default)]
    service_arn: String,
    #[serde(default)]
    status: String,
    task_definition: String,
    #[serde(default)]
    desired_count: u32,
    #[serde(default)]
    running_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTaskDefinitionsOutput {
    #[serde(default)]
    task_definition_arns: Vec<String>,
}

impl DescribedService {
    /// `service` may be configured as a name or a full ARN.
    fn is(&self, service: &str) -> bool {
        self.service_name == service || self.service_arn == service
    }
}

/// The live entry for `service`; deleted services stay listed as INACTIVE.
fn find_active(services: Vec<DescribedService>, service: &str) -> Option<DescribedService> {
    services
        .into_iter()
        .find(|s| s.is(service) && s.status != "INACTIVE")
}

fn provider(e: CliError) -> SchedulerError {
    SchedulerError::Provider(e.to_string())
}

#[async_trait]
impl SchedulerOps for AwsCli {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceDescriptor>, SchedulerError> {
        let result: Result<DescribeServicesOutput, CliError> = self
            .json(&["ecs", "describe-services", "--cluster", cluster, "--services", service])
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.has_code(&["ClusterNotFoundException"]) => return Ok(None),
            Err(e) => return Err(provider(e)),
        };

        // Missing services come back under `failures`.
        Ok(find_active(output.services, service).map(|s| ServiceDescriptor {
            cluster: cluster.to_string(),
            service: s.service_name,
            descriptor: s.task_definition,
            desired_count: s.desired_count,
            running_count: s.running_count,
        }))
    }

    async fn force_redeploy(&self, cluster: &str, service: &str) -> Result<(), SchedulerError> {
        self.run(&[
            "ecs",
            "update-service",
            "--cluster",
            cluster,
            "--service",
            service,
            "--force-new-deployment",
        ])
        .await
        .map(|_| ())
        .map_err(provider)
    }

    async fn list_revisions(&self, family: &str) -> Result<Vec<String>, SchedulerError> {
        let output: ListTaskDefinitionsOutput = self
            .json(&[
                "ecs",
                "list-task-definitions",
                "--family-prefix",
                family,
                "--sort",
                "DESC",
            ])
            .await
            .map_err(provider)?;
        Ok(output.task_definition_arns)
    }

    async fn update_descriptor(
        &self,
        cluster: &str,
        service: &str,
        descriptor: &str,
    ) -> Result<(), SchedulerError> {
        self.run(&[
            "ecs",
            "update-service",
            "--cluster",
            cluster,
            "--service",
            service,
            "--task-definition",
            descriptor,
        ])
        .await
        .map(|_| ())
        .map_err(provider)
    }
}
