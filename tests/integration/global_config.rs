use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

use stackbind_cli::config::GlobalConfig;
use stackbind_cli::naming::NamingVersion;
use stackbind_cli::resources::ResourceKind;
use stackbind_cli::test_utils::write_fixture_files;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
#[serial]
async fn test_config_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "organization = \"acme\"\ndefault_naming_version = 1\n");

    // SAFETY: serialized with every other test that touches the process environment.
    unsafe { std::env::set_var("STACKBIND_CONFIG", &path) };
    let loaded = GlobalConfig::load_with_optional(None).await;
    unsafe { std::env::remove_var("STACKBIND_CONFIG") };

    let config = loaded.unwrap();
    assert_eq!(config.organization.as_deref(), Some("acme"));
    assert_eq!(config.default_naming_version, NamingVersion::Legacy);
    assert_eq!(config.password_length, 20);
}

#[tokio::test]
#[serial]
async fn test_explicit_path_wins_over_environment() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(&dir, "organization = \"from-env\"\n");
    let explicit = dir.path().join("missing.toml");

    unsafe { std::env::set_var("STACKBIND_CONFIG", &env_path) };
    let loaded = GlobalConfig::load_with_optional(Some(explicit)).await;
    unsafe { std::env::remove_var("STACKBIND_CONFIG") };

    assert_eq!(loaded.unwrap(), GlobalConfig::default());
}

#[tokio::test]
async fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = GlobalConfig {
        organization: Some("acme".to_string()),
        password_length: 32,
        ..GlobalConfig::default()
    };
    config.max_name_lengths.insert(ResourceKind::MongodbAtlas, 30);

    config.save_to(&path).await.unwrap();
    let reloaded = GlobalConfig::load_from(&path).await.unwrap();

    assert_eq!(reloaded, config);
    assert_eq!(reloaded.max_name_length(ResourceKind::MongodbAtlas), 30);
    assert_eq!(reloaded.max_name_length(ResourceKind::S3Bucket), 63);
}

#[test]
fn test_config_changes_cli_naming() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "default_naming_version = 1\n");

    Command::cargo_bin("stackbind")
        .unwrap()
        .env_remove("RUST_LOG")
        .env("STACKBIND_CONFIG", &path)
        .args(["name", "--stack", "integrail", "--resource", "mongo-main", "--env", "test"])
        .assert()
        .success()
        .stdout("integrail---main--test\n");
}

#[test]
fn test_organization_qualifies_parent_reference() {
    let dir = TempDir::new().unwrap();
    let files = write_fixture_files(dir.path()).unwrap();
    let config = write_config(&dir, "organization = \"acme\"\n");

    Command::cargo_bin("stackbind")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .arg("--parent")
        .arg(&files.parent)
        .arg("--client")
        .arg(&files.billing)
        .args(["--env", "test", "--exports"])
        .arg(&files.exports)
        .assert()
        .failure()
        .stderr(predicate::str::contains("acme/integrail/integrail--test"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "password_length = \"long\"\n");

    Command::cargo_bin("stackbind")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&path)
        .args(["name", "--stack", "integrail", "--resource", "mongo-main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse global config"));
}
