use std::sync::Arc;

use stackbind_cli::core::{BindError, Output, promise};
use stackbind_cli::credentials::{
    BackingResource, ConsumerIdentity, CredentialProvisioner, MemoryCredentialBackend,
    RoleBinding, credential_object_name, default_roles,
};

fn backing() -> BackingResource {
    BackingResource {
        identifier: "integrail--mongo-m-b607".to_string(),
        project_id: Output::ready("proj-1".to_string()),
    }
}

#[test]
fn test_dependency_consumer_naming() {
    let consumer = ConsumerIdentity::dependency("reports", "test", "billing", "billing-db");
    assert_eq!(consumer.username(), "reports--dep--billing--billing-db");
    assert_eq!(consumer.database(), "billing");
    assert_eq!(
        credential_object_name("integrail--mongo-m-b607", &consumer),
        "integrail--mongo-m-b607--reports--dep--billing--billing-db"
    );

    let direct = ConsumerIdentity::direct("billing", "test");
    assert_eq!(direct.username(), "billing");
    assert_eq!(direct.database(), "billing");
}

#[test]
fn test_role_policy() {
    let direct = default_roles(&ConsumerIdentity::direct("billing", "test"));
    assert_eq!(
        direct,
        vec![
            RoleBinding::new("billing", "readWrite"),
            RoleBinding::new("billing", "dbAdmin"),
            RoleBinding::new("local", "read"),
        ]
    );

    let dependency =
        default_roles(&ConsumerIdentity::dependency("reports", "test", "billing", "billing-db"));
    assert_eq!(dependency, vec![RoleBinding::new("billing", "readWrite")]);
}

#[tokio::test]
async fn test_grant_reaches_backend() {
    let backend = Arc::new(MemoryCredentialBackend::new());
    let provisioner = CredentialProvisioner::new(backend.clone());
    let consumer = ConsumerIdentity::dependency("reports", "test", "billing", "billing-db");

    let grant = provisioner
        .grant(&consumer, &backing(), default_roles(&consumer), Output::ready(()))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(grant.username, "reports--dep--billing--billing-db");
    assert_eq!(grant.password.len(), 20);
    assert_eq!(grant.backing_resource_ref, "integrail--mongo-m-b607");

    let stored = backend.user(&grant.object_name).unwrap();
    assert_eq!(stored.project_id, "proj-1");
    assert_eq!(stored.password, grant.password);
    assert_eq!(stored.roles, grant.role_bindings);
}

#[tokio::test]
async fn test_regrant_updates_in_place() {
    let backend = Arc::new(MemoryCredentialBackend::new());
    let provisioner = CredentialProvisioner::new(backend.clone()).with_password_length(32);
    let consumer = ConsumerIdentity::direct("billing", "test");

    let issue = || {
        provisioner
            .grant(&consumer, &backing(), default_roles(&consumer), Output::ready(()))
            .unwrap()
    };
    let first = issue().await.unwrap();
    let second = issue().await.unwrap();

    assert_eq!(first.object_name, second.object_name);
    assert_eq!(second.password.len(), 32);
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.user(&second.object_name).unwrap().password, second.password);
}

#[tokio::test]
async fn test_grant_waits_for_dependency() {
    let backend = Arc::new(MemoryCredentialBackend::new());
    let provisioner = CredentialProvisioner::new(backend.clone());
    let consumer = ConsumerIdentity::direct("billing", "test");
    let (cluster_ready, depends_on) = promise::<()>("cluster");

    let grant = provisioner
        .grant(&consumer, &backing(), default_roles(&consumer), depends_on)
        .unwrap();
    let pending = tokio::spawn(async move { grant.await });
    tokio::task::yield_now().await;
    assert!(backend.is_empty());

    cluster_ready.resolve(());
    pending.await.unwrap().unwrap();
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_invalid_requests_fail_before_scheduling() {
    let provisioner = CredentialProvisioner::new(Arc::new(MemoryCredentialBackend::new()));
    let consumer = ConsumerIdentity::direct("billing", "test");

    let no_roles = provisioner.grant(&consumer, &backing(), Vec::new(), Output::ready(()));
    assert!(matches!(no_roles, Err(BindError::Configuration { .. })));

    let anonymous = ConsumerIdentity::direct("", "test");
    let roles = vec![RoleBinding::new("billing", "readWrite")];
    let err = provisioner.grant(&anonymous, &backing(), roles, Output::ready(())).unwrap_err();
    assert!(err.to_string().contains("consumer stack name is empty"));

    let mut unnamed = backing();
    unnamed.identifier = String::new();
    let err = provisioner
        .grant(&consumer, &unnamed, default_roles(&consumer), Output::ready(()))
        .unwrap_err();
    assert!(matches!(err, BindError::Configuration { .. }));
}

#[test]
fn test_separator_in_dependency_segments_is_rejected() {
    let backend = Arc::new(MemoryCredentialBackend::new());
    let provisioner = CredentialProvisioner::new(backend.clone());

    // Both would otherwise share the user `reports--dep--a--b--c`.
    for consumer in [
        ConsumerIdentity::dependency("reports", "test", "a--b", "c"),
        ConsumerIdentity::dependency("reports", "test", "a", "b--c"),
    ] {
        let roles = default_roles(&consumer);
        let err = provisioner.grant(&consumer, &backing(), roles, Output::ready(())).unwrap_err();
        assert!(matches!(err, BindError::Configuration { .. }));
        assert!(err.to_string().contains("must not contain '--'"));
    }
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_backend_failure_names_consumer_and_backing() {
    let provisioner =
        CredentialProvisioner::new(Arc::new(MemoryCredentialBackend::failing("quota exceeded")));
    let consumer = ConsumerIdentity::direct("billing", "test");

    let err = provisioner
        .grant(&consumer, &backing(), default_roles(&consumer), Output::ready(()))
        .unwrap()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BindError::Provisioning {
            consumer: "billing/test".to_string(),
            backing: "integrail--mongo-m-b607".to_string(),
            reason: "quota exceeded".to_string(),
        }
    );
}
