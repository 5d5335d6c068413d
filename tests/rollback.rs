// ABOUTME: Integration tests for rolling back the persistent service.
// ABOUTME: Tests restart-in-place, previous-revision, and refusal on unknown services.

mod support;

use ephemeron::deploy::{DeployError, ErrorClass, RollbackMode, RollbackRequest, rollback};
use ephemeron::types::EnvironmentName;
use support::fake_cloud::{Call, FakeCloud};

const CLUSTER: &str = "java-app-cluster-dev";
const SERVICE: &str = "java-app-service-dev";

fn arn(revision: u32) -> String {
    format!("arn:aws:ecs:eu-north-1:123456789012:task-definition/java-app:{revision}")
}

fn request() -> RollbackRequest {
    RollbackRequest {
        cluster: CLUSTER.to_string(),
        service: SERVICE.to_string(),
        environment: EnvironmentName::new("dev").unwrap(),
    }
}

fn cloud_with_service(active: u32) -> FakeCloud {
    let cloud = FakeCloud::new();
    cloud.add_service(CLUSTER, SERVICE, &arn(active));
    cloud
}

mod restart {
    use super::*;

    #[tokio::test]
    async fn forces_redeploy_of_active_descriptor() {
        let cloud = cloud_with_service(7);

        let report = rollback(&cloud, request(), RollbackMode::RestartInPlace)
            .await
            .unwrap();

        assert_eq!(report.mode, RollbackMode::RestartInPlace);
        assert_eq!(report.from, arn(7));
        assert_eq!(report.to, arn(7));
        assert_eq!(
            cloud.scheduler_mutations(),
            vec![Call::ForceRedeploy(CLUSTER.to_string(), SERVICE.to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_service_changes_nothing() {
        let cloud = FakeCloud::new();

        let err = rollback(&cloud, request(), RollbackMode::RestartInPlace)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::ServiceNotFound { .. }));
        assert_eq!(err.class(), ErrorClass::Rollback);
        assert!(cloud.scheduler_mutations().is_empty());
    }
}

mod previous {
    use super::*;

    #[tokio::test]
    async fn moves_service_one_revision_back() {
        let cloud = cloud_with_service(7);
        cloud.set_revisions(&[arn(7), arn(6), arn(5)]);

        let report = rollback(&cloud, request(), RollbackMode::PreviousRevision)
            .await
            .unwrap();

        assert_eq!(report.from, arn(7));
        assert_eq!(report.to, arn(6));
        assert_eq!(cloud.service_descriptor(CLUSTER, SERVICE), Some(arn(6)));
        assert!(cloud.calls().contains(&Call::ListRevisions("java-app".to_string())));
    }

    #[tokio::test]
    async fn skips_revisions_newer_than_active() {
        // the active descriptor was itself a rollback target
        let cloud = cloud_with_service(5);
        cloud.set_revisions(&[arn(7), arn(6), arn(5), arn(3)]);

        let report = rollback(&cloud, request(), RollbackMode::PreviousRevision)
            .await
            .unwrap();

        assert_eq!(report.to, arn(3));
    }

    #[tokio::test]
    async fn first_revision_has_nothing_to_return_to() {
        let cloud = cloud_with_service(1);
        cloud.set_revisions(&[arn(1)]);

        let err = rollback(&cloud, request(), RollbackMode::PreviousRevision)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::NoPreviousRevision(_)));
        assert!(cloud.scheduler_mutations().is_empty());
        assert_eq!(cloud.service_descriptor(CLUSTER, SERVICE), Some(arn(1)));
    }

    #[tokio::test]
    async fn unknown_service_changes_nothing() {
        let cloud = FakeCloud::new();
        cloud.set_revisions(&[arn(2), arn(1)]);

        let err = rollback(&cloud, request(), RollbackMode::PreviousRevision)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::ServiceNotFound { .. }));
        assert!(cloud.scheduler_mutations().is_empty());
        assert!(!cloud.calls().iter().any(|c| matches!(c, Call::ListRevisions(_))));
    }
}

#[test]
fn report_serializes_request_fields_inline() {
    let report = ephemeron::deploy::RollbackReport {
        request: request(),
        mode: RollbackMode::PreviousRevision,
        from: arn(4),
        to: arn(3),
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["cluster"], CLUSTER);
    assert_eq!(json["environment"], "dev");
    assert_eq!(json["mode"], "previous-revision");
}
