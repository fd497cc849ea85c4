//! Test utilities for stackbind
//!
//! Shared fixtures for unit and integration tests: a logging initializer, a
//! parent/client descriptor pair with matching export snapshots, and helpers
//! that write them to a temporary directory for CLI tests.
//!
//! The fixture models one infrastructure stack `integrail` with a MongoDB
//! cluster (`mongo-main`) and a bucket (`assets`), consumed in environment
//! `test` by the compute stack `billing` (direct use of both) and `reports`
//! (dependency on billing's database).

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::stack::{MemoryExportSource, StackExports};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, else `RUST_LOG`; with neither, logging stays off.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Full reference of the fixture parent stack.
pub const PARENT_REFERENCE: &str = "integrail--test";

/// Base URI exported for the fixture cluster.
pub const MONGO_BASE_URI: &str = "mongodb+srv://cluster0.ab12c.mongodb.net/?retryWrites=true";

/// `server.yaml` of the fixture parent stack.
pub const PARENT_DESCRIPTOR: &str = r#"name: integrail
resources:
  test:
    resources:
      mongo-main:
        type: mongodb-atlas
        config: {}
      assets:
        type: s3-bucket
        config:
          namingVersion: 1
"#;

/// `client.yaml` of the direct consumer.
pub const BILLING_DESCRIPTOR: &str = r#"name: billing
stacks:
  test:
    parent: integrail
    uses: [mongo-main, assets]
    env:
      LOG_LEVEL: info
      DATABASE_NAME: ${resource:mongo-main.dbName}
      CACHE_URL: ${resource:redis-main.uri}
    secrets:
      API_TOKEN: token-for-${resource:mongo-main.user}
"#;

/// `client.yaml` of the dependency consumer.
pub const REPORTS_DESCRIPTOR: &str = r#"name: reports
stacks:
  test:
    parent: integrail
    dependencies:
      - name: billing-db
        owner: billing
        resource: mongo-main
    env:
      BILLING_DB: ${dependency:billing-db.dbName}
"#;

/// Exports of the fixture parent stack.
pub fn parent_exports() -> StackExports {
    [
        ("integrail--mongo-m-b607-id", "proj-1"),
        ("integrail--mongo-m-b607-cluster-id", "cluster-1"),
        ("integrail--mongo-m-b607-mongo-uri", MONGO_BASE_URI),
        ("integrail--mongo-m-b607-mongo-uri-options", "w=majority"),
        ("integrail--mongo-m-b607-service-user", "integrail-svc"),
        ("integrail--assets--test-bucket-name", "integrail-assets-test"),
        ("integrail--assets--test-region", "eu-west-1"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

/// Export source holding [`parent_exports`].
pub fn parent_export_source() -> Arc<MemoryExportSource> {
    let source = MemoryExportSource::new();
    source.insert(PARENT_REFERENCE, parent_exports());
    Arc::new(source)
}

/// Paths of fixture files written by [`write_fixture_files`].
#[derive(Debug, Clone)]
pub struct FixtureFiles {
    pub parent: PathBuf,
    pub billing: PathBuf,
    pub reports: PathBuf,
    pub exports: PathBuf,
}

/// Write the descriptors and an exports snapshot into `dir`.
pub fn write_fixture_files(dir: &Path) -> Result<FixtureFiles> {
    let files = FixtureFiles {
        parent: dir.join("server.yaml"),
        billing: dir.join("billing.yaml"),
        reports: dir.join("reports.yaml"),
        exports: dir.join("exports.json"),
    };

    let snapshot = BTreeMap::from([(PARENT_REFERENCE, parent_exports())]);
    for (path, content) in [
        (&files.parent, PARENT_DESCRIPTOR.to_string()),
        (&files.billing, BILLING_DESCRIPTOR.to_string()),
        (&files.reports, REPORTS_DESCRIPTOR.to_string()),
        (&files.exports, serde_json::to_string_pretty(&snapshot)?),
    ] {
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write fixture {}", path.display()))?;
    }
    Ok(files)
}
