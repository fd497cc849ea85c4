use std::sync::Arc;

use stackbind_cli::core::BindError;
use stackbind_cli::stack::{MemoryExportSource, StackReference, StackReferenceResolver};
use stackbind_cli::test_utils::{MONGO_BASE_URI, PARENT_REFERENCE, parent_export_source};

#[test]
fn test_reference_formats() {
    let plain = StackReference::new("integrail", "test").unwrap();
    assert_eq!(plain.full_reference(), PARENT_REFERENCE);
    assert_eq!(plain.organization(), None);

    let qualified = StackReference::with_organization("acme", "integrail", "prod").unwrap();
    assert_eq!(qualified.full_reference(), "acme/integrail/integrail--prod");

    let parsed: StackReference = "acme/integrail/integrail--prod".parse().unwrap();
    assert_eq!(parsed, qualified);
    let parsed: StackReference = "integrail--test".parse().unwrap();
    assert_eq!(parsed.owner_stack(), "integrail");
    assert_eq!(parsed.environment(), "test");

    assert!(StackReference::new("integrail", "").is_err());
    assert!("integrail".parse::<StackReference>().is_err());
}

#[test]
fn test_qualified_reference_project_must_match_stack() {
    let err = "acme/billing/integrail--prod".parse::<StackReference>().unwrap_err();
    assert!(matches!(err, BindError::Configuration { .. }));
    assert!(err.to_string().contains("project 'billing' does not match stack 'integrail'"));

    let parsed: StackReference = "acme/integrail/integrail--prod".parse().unwrap();
    assert_eq!(parsed.to_string(), "acme/integrail/integrail--prod");
}

#[tokio::test]
async fn test_resolves_exports_and_shares_handle() {
    let source = parent_export_source();
    let resolver = StackReferenceResolver::new(source.clone());
    let reference = StackReference::new("integrail", "test").unwrap();

    let uri = resolver.resolve(&reference, "integrail--mongo-m-b607-mongo-uri", true);
    let project = resolver.resolve(&reference, "integrail--mongo-m-b607-id", true);
    assert_eq!(uri.await.unwrap(), MONGO_BASE_URI);
    assert_eq!(project.await.unwrap(), "proj-1");

    assert_eq!(resolver.open_handles(), 1);
    assert_eq!(source.open_count(), 1);
}

#[tokio::test]
async fn test_missing_required_export_names_key_and_stack() {
    let resolver = StackReferenceResolver::new(parent_export_source());
    let reference = StackReference::new("integrail", "test").unwrap();

    let err = resolver
        .resolve(&reference, "integrail--mongo-m-b607-mongo-url", true)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Required export 'integrail--mongo-m-b607-mongo-url' not found in stack 'integrail--test'"
    );
    match &err {
        BindError::Resolution {
            suggestions,
            ..
        } => assert_eq!(
            suggestions.first().map(String::as_str),
            Some("integrail--mongo-m-b607-mongo-uri")
        ),
        other => panic!("expected a resolution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_optional_export_defaults_to_empty() {
    let source = Arc::new(MemoryExportSource::new());
    source.insert("integrail--test", [("db-mongo-uri-options", "")]);
    let resolver = StackReferenceResolver::new(source);
    let reference = StackReference::new("integrail", "test").unwrap();

    assert_eq!(resolver.resolve(&reference, "db-mongo-uri-options", false).await.unwrap(), "");
    assert_eq!(resolver.resolve(&reference, "db-service-user", false).await.unwrap(), "");
    assert!(resolver.resolve(&reference, "db-mongo-uri-options", true).await.is_err());
}

#[tokio::test]
async fn test_unknown_stack_is_unavailable() {
    let resolver = StackReferenceResolver::new(parent_export_source());
    let reference = StackReference::new("integrail", "prod").unwrap();

    let err = resolver.resolve(&reference, "integrail--mongo-m-b607-id", true).await.unwrap_err();
    assert!(matches!(err, BindError::StackUnavailable { reference, .. } if reference == "integrail--prod"));
}
