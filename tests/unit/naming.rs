use stackbind_cli::core::BindError;
use stackbind_cli::naming::{NamingVersion, ResourceIdentity, name};

fn identity(owner: &str, resource: &str, env: &str, version: NamingVersion) -> ResourceIdentity {
    ResourceIdentity::new(owner, resource).with_environment(env).with_version(version)
}

#[test]
fn test_known_identifiers() {
    let mongo = |version| identity("integrail", "mongo-main", "test", version);
    assert_eq!(name(&mongo(NamingVersion::Legacy), 23).unwrap(), "integrail---main--test");
    assert_eq!(name(&mongo(NamingVersion::Hashed), 23).unwrap(), "integrail--mongo-m-b607");

    let assets = identity("integrail", "assets", "test", NamingVersion::Legacy);
    assert_eq!(name(&assets, 63).unwrap(), "integrail--assets--test");

    let pool = ResourceIdentity::new("integrail", "mongodb-pool-dedicated-1");
    assert_eq!(name(&pool, 23).unwrap(), "integrail--mongodb-ae64");
}

#[test]
fn test_names_are_deterministic() {
    let id = identity("platform", "orders-primary-cluster", "prod", NamingVersion::Hashed);
    let first = name(&id, 23).unwrap();
    for _ in 0..10 {
        assert_eq!(name(&id, 23).unwrap(), first);
    }
}

#[test]
fn test_names_never_exceed_limit() {
    let owners = ["a", "integrail", "a-very-long-infrastructure-stack-name"];
    let resources = ["db", "mongo-main", "shared-analytics-warehouse-replica"];
    let envs = ["", "test", "production-eu-west-1"];

    for version in [NamingVersion::Legacy, NamingVersion::Hashed] {
        for owner in owners {
            for resource in resources {
                for env in envs {
                    let id = identity(owner, resource, env, version);
                    for max_len in [8, 12, 23, 40, 63] {
                        let derived = name(&id, max_len).unwrap();
                        assert!(
                            derived.chars().count() <= max_len,
                            "{derived} is longer than {max_len} ({version})"
                        );
                        assert!(!derived.is_empty());
                    }
                }
            }
        }
    }
}

#[test]
fn test_short_names_are_kept_whole() {
    let id = identity("platform", "orders", "prod", NamingVersion::Legacy);
    assert_eq!(name(&id, 63).unwrap(), "platform--orders--prod");
}

#[test]
fn test_hashed_names_separate_legacy_collisions() {
    let east = |version| identity("integrail", "orders-east-primary", "test", version);
    let west = |version| identity("integrail", "orders-west-primary", "test", version);

    assert_eq!(
        name(&east(NamingVersion::Legacy), 23).unwrap(),
        name(&west(NamingVersion::Legacy), 23).unwrap()
    );
    assert_ne!(
        name(&east(NamingVersion::Hashed), 23).unwrap(),
        name(&west(NamingVersion::Hashed), 23).unwrap()
    );
}

#[test]
fn test_override_wins_and_is_bounded() {
    let id = identity("integrail", "mongo-main", "test", NamingVersion::Hashed)
        .with_override(Some("billing_primary".to_string()));
    assert_eq!(name(&id, 23).unwrap(), "billing-primary");

    let long = id.with_override(Some("an-explicitly-chosen-but-far-too-long-name".to_string()));
    let derived = name(&long, 23).unwrap();
    assert!(derived.chars().count() <= 23);
    assert!(derived.starts_with("an-"));
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let empty_owner = identity("", "mongo-main", "test", NamingVersion::Hashed);
    assert!(matches!(name(&empty_owner, 23), Err(BindError::Naming { .. })));

    let empty_resource = identity("integrail", " ", "test", NamingVersion::Hashed);
    assert!(matches!(name(&empty_resource, 23), Err(BindError::Naming { .. })));

    let valid = identity("integrail", "mongo-main", "test", NamingVersion::Hashed);
    let err = name(&valid, 7).unwrap_err();
    assert!(err.to_string().contains("below the minimum"));
}

#[test]
fn test_version_parsing() {
    assert_eq!(NamingVersion::try_from(1u8).unwrap(), NamingVersion::Legacy);
    assert_eq!(NamingVersion::try_from(2u8).unwrap(), NamingVersion::Hashed);
    assert!(NamingVersion::try_from(3u8).is_err());
    assert_eq!(NamingVersion::default(), NamingVersion::Hashed);
}
