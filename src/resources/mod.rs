//! Resource kinds and their binding handlers.
//!
//! A parent descriptor declares resources as a `type` tag plus a `config`
//! payload. The payload is parsed once into the closed [`ResourceConfig`] enum;
//! from then on every consumption site matches on the variant instead of
//! inspecting untyped data.
//!
//! Binding a resource into a consuming stack is the job of a
//! [`ResourceBinder`]. The [`ResourceRegistry`] maps each [`ResourceKind`] to
//! its binder. It is built explicitly at startup ([`ResourceRegistry::builtin`])
//! and handed to the orchestrator, so the set of supported kinds is visible in
//! one place.
//!
//! # Supported kinds
//!
//! | Tag                | Exports                                                      | Credential |
//! |--------------------|--------------------------------------------------------------|------------|
//! | `mongodb-atlas`    | `-id`, `-cluster-id`, `-mongo-uri`, `-mongo-uri-options`, `-service-user` | yes |
//! | `aws-rds-postgres` | `-id`, `-host`, `-port`, `-root-user`                        | yes        |
//! | `s3-bucket`        | `-bucket-name`, `-region`                                    | no         |
//!
//! Export keys are `<identifier>-<suffix>`, where the identifier is the
//! [`crate::naming`] result for the parent stack, resource name and
//! environment.

pub mod bucket;
pub mod mongodb;
pub mod postgres;

pub use bucket::S3BucketBinder;
pub use mongodb::MongoDbAtlasBinder;
pub use postgres::PostgresBinder;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::{BindingSource, ComputeContextCollector, TemplateNamespace, to_env_key};
use crate::core::{BindError, Output};
use crate::credentials::{ConsumerIdentity, ConsumerKind, CredentialProvisioner};
use crate::naming::{self, NamingVersion, ResourceIdentity};
use crate::stack::{StackReference, StackReferenceResolver};

/// Tag of a supported resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "mongodb-atlas")]
    MongodbAtlas,
    #[serde(rename = "aws-rds-postgres")]
    Postgres,
    #[serde(rename = "s3-bucket")]
    S3Bucket,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::MongodbAtlas, Self::Postgres, Self::S3Bucket];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MongodbAtlas => "mongodb-atlas",
            Self::Postgres => "aws-rds-postgres",
            Self::S3Bucket => "s3-bucket",
        }
    }

    /// Identifier length limit of the system that names this kind.
    pub fn default_max_name_length(self) -> usize {
        match self {
            Self::MongodbAtlas => 23,
            Self::Postgres => 63,
            Self::S3Bucket => 63,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or_else(|| {
            BindError::configuration(format!(
                "unknown resource type '{s}', expected one of: {}",
                Self::ALL.map(ResourceKind::as_str).join(", ")
            ))
        })
    }
}

/// Naming settings shared by every resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingOptions {
    /// Naming version; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_version: Option<NamingVersion>,
    /// Explicit identifier
    #[serde(default, rename = "name", skip_serializing_if = "Option::is_none")]
    pub name_override: Option<String>,
}

/// MongoDB Atlas cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoConfig {
    #[serde(flatten)]
    pub naming: NamingOptions,
    /// Extra URI options appended by consumers (`appName=x&w=1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri_options: Option<String>,
}

/// AWS RDS Postgres instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgresConfig {
    #[serde(flatten)]
    pub naming: NamingOptions,
    /// Port used when the parent does not export one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// S3 bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    #[serde(flatten)]
    pub naming: NamingOptions,
    /// Key prefix consumers should write under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

/// Configuration of a declared resource, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum ResourceConfig {
    #[serde(rename = "mongodb-atlas")]
    MongodbAtlas(MongoConfig),
    #[serde(rename = "aws-rds-postgres")]
    Postgres(PostgresConfig),
    #[serde(rename = "s3-bucket")]
    S3Bucket(BucketConfig),
}

impl ResourceConfig {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::MongodbAtlas(_) => ResourceKind::MongodbAtlas,
            Self::Postgres(_) => ResourceKind::Postgres,
            Self::S3Bucket(_) => ResourceKind::S3Bucket,
        }
    }

    pub fn naming(&self) -> &NamingOptions {
        match self {
            Self::MongodbAtlas(config) => &config.naming,
            Self::Postgres(config) => &config.naming,
            Self::S3Bucket(config) => &config.naming,
        }
    }
}

/// One resource to bind into one consumer.
#[derive(Debug, Clone)]
pub struct BindingRequest<'a> {
    /// Resource name in the parent descriptor
    pub resource_name: &'a str,
    pub config: &'a ResourceConfig,
    /// Stack that provisioned the resource
    pub parent: &'a StackReference,
    pub consumer: &'a ConsumerIdentity,
    /// Naming version for resources that do not pin one
    pub default_version: NamingVersion,
    pub max_name_length: usize,
}

impl BindingRequest<'_> {
    /// Identity the parent stack named this resource with.
    pub fn resource_identity(&self) -> ResourceIdentity {
        let naming = self.config.naming();
        ResourceIdentity::new(self.parent.owner_stack(), self.resource_name)
            .with_environment(self.parent.environment())
            .with_version(naming.naming_version.unwrap_or(self.default_version))
            .with_override(naming.name_override.clone())
    }

    /// Identifier of the resource, the prefix of its export keys.
    pub fn identifier(&self) -> Result<String, BindError> {
        naming::name(&self.resource_identity(), self.max_name_length)
    }

    pub fn source(&self) -> BindingSource {
        BindingSource::new(self.config.kind().as_str(), self.resource_name, self.parent.owner_stack())
    }

    /// Where template attributes of this binding are registered.
    pub fn template_entity(&self) -> (TemplateNamespace, String) {
        match &self.consumer.kind {
            ConsumerKind::Direct => (TemplateNamespace::Resource, self.resource_name.to_string()),
            ConsumerKind::Dependency {
                dependency_name,
                ..
            } => (TemplateNamespace::Dependency, dependency_name.clone()),
        }
    }

    /// Env key `<PREFIX>_<FIELD>`, or `<PREFIX>_DEP_<DEPENDENCY>_<FIELD>` for dependencies.
    pub fn env_key(&self, prefix: &str, field: &str) -> String {
        match &self.consumer.kind {
            ConsumerKind::Direct => to_env_key(&format!("{prefix}_{field}")),
            ConsumerKind::Dependency {
                dependency_name,
                ..
            } => to_env_key(&format!("{prefix}_DEP_{dependency_name}_{field}")),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.consumer.kind, ConsumerKind::Direct)
    }

    fn kind_mismatch(&self, expected: ResourceKind) -> BindError {
        BindError::configuration(format!(
            "resource '{}' is of type '{}' but was routed to the '{}' binder",
            self.resource_name,
            self.config.kind(),
            expected
        ))
    }
}

/// Export key `<identifier>-<suffix>`.
pub fn export_key(identifier: &str, suffix: &str) -> String {
    format!("{identifier}-{suffix}")
}

/// Collaborators shared by every binder during one run.
#[derive(Debug, Clone)]
pub struct BindingServices {
    pub resolver: StackReferenceResolver,
    pub provisioner: CredentialProvisioner,
    pub collector: ComputeContextCollector,
}

impl BindingServices {
    /// Resolve export `<identifier>-<suffix>` of `parent`.
    pub fn export(
        &self,
        parent: &StackReference,
        identifier: &str,
        suffix: &str,
        required: bool,
    ) -> Output<String> {
        self.resolver.resolve(parent, &export_key(identifier, suffix), required)
    }
}

/// Binds one resource kind into consumers.
pub trait ResourceBinder: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Export suffixes the parent stack publishes for this kind.
    fn export_suffixes(&self) -> &'static [&'static str];

    /// Export keys read for the resource named `identifier`.
    fn export_keys(&self, identifier: &str) -> Vec<String> {
        self.export_suffixes().iter().map(|suffix| export_key(identifier, suffix)).collect()
    }

    /// Schedule the binding of `request`.
    ///
    /// Configuration problems are returned immediately. The output resolves
    /// once every env binding and template extension of the resource has been
    /// added to the collector, and fails if any export or grant fails.
    fn bind(
        &self,
        request: &BindingRequest<'_>,
        services: &BindingServices,
    ) -> Result<Output<()>, BindError>;
}

/// Resource kind tag to binder.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    binders: HashMap<ResourceKind, Arc<dyn ResourceBinder>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every in-tree binder.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MongoDbAtlasBinder));
        registry.register(Arc::new(PostgresBinder));
        registry.register(Arc::new(S3BucketBinder));
        registry
    }

    /// Register `binder`, returning the binder it replaced.
    pub fn register(&mut self, binder: Arc<dyn ResourceBinder>) -> Option<Arc<dyn ResourceBinder>> {
        self.binders.insert(binder.kind(), binder)
    }

    pub fn get(&self, kind: ResourceKind) -> Result<Arc<dyn ResourceBinder>, BindError> {
        self.binders.get(&kind).cloned().ok_or_else(|| {
            BindError::configuration(format!("no binder registered for resource type '{kind}'"))
        })
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = self.binders.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry").field("kinds", &self.kinds()).finish()
    }
}
