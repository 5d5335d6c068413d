// ABOUTME: Integration tests for key pair name to private key resolution.
// ABOUTME: Tests exact-one lookup, ambiguity, missing secrets, and access denial.

mod support;

use ephemeron::deploy::{DeployError, SecretResolver};
use support::fake_cloud::{Call, FakeCloud, PRIVATE_KEY};

#[tokio::test]
async fn resolves_single_key_pair() {
    let cloud = FakeCloud::new();
    let material = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-dev")
        .await
        .unwrap();

    assert_eq!(material.key_id.as_str(), "key-0dev");
    assert_eq!(material.expose(), PRIVATE_KEY);
    assert_eq!(
        cloud.calls(),
        vec![
            Call::KeyPairIds("kp-dev".to_string()),
            Call::FetchKey("key-0dev".to_string()),
        ]
    );
}

#[tokio::test]
async fn unknown_name_is_a_lookup_error() {
    let cloud = FakeCloud::new();
    let err = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-missing")
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::LookupError(_)));
    assert!(!cloud.calls().iter().any(|c| matches!(c, Call::FetchKey(_))));
}

#[tokio::test]
async fn ambiguous_name_is_a_lookup_error() {
    let cloud = FakeCloud::new();
    cloud.add_key_pair("kp-dev", "key-0dup");

    let err = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-dev")
        .await
        .unwrap_err();

    match err {
        DeployError::LookupError(message) => assert!(message.contains("2 identifiers")),
        other => panic!("expected LookupError, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_secret_is_a_lookup_error() {
    let cloud = FakeCloud::empty();
    cloud.add_key_pair("kp-dev", "key-0nosecret");

    let err = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-dev")
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::LookupError(_)));
}

#[tokio::test]
async fn denied_decryption_is_access_denied() {
    let cloud = FakeCloud::new();
    cloud.deny_secrets();

    let err = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-dev")
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::AccessDenied(_)));
}

#[tokio::test]
async fn written_credential_is_owner_only_and_newline_terminated() {
    use std::os::unix::fs::PermissionsExt;

    let cloud = FakeCloud::new();
    let material = SecretResolver::new(&cloud, &cloud)
        .resolve("kp-dev")
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("id_key.pem");
    material.write_to(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, format!("{PRIVATE_KEY}\n"));
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
