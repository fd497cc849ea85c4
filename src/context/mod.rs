//! Compute context accumulation.
//!
//! Many resources contribute to the environment of one compute stack: database
//! URIs, user names, secrets, bucket names. Each contribution arrives from a
//! continuation attached to an export or credential [`crate::core::Output`],
//! in whatever order the provisioning engine happens to resolve them.
//! [`ComputeContextCollector`] accumulates those contributions concurrently and
//! [`ComputeContextCollector::merge`] snapshots them into a [`ComputeContext`].
//!
//! # Conflict policy
//!
//! - [`ComputeContextCollector::add_env`] overwrites. It is used for values the
//!   descriptor author set explicitly.
//! - [`ComputeContextCollector::add_env_if_not_exists`] keeps whichever binding
//!   was registered first. Resource bindings use it, so a resource reached
//!   through several paths never clobbers a value that is already resolved.
//!
//! Keys are normalized to upper snake case before either check, which makes
//! `mongo_uri` and `MONGO_URI` the same key.

pub mod uri;

pub use uri::{append_options, append_user_password_and_db, parse_connection_uri};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::constants::SECRET_MASK;
use crate::core::BindError;

/// Where a binding came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSource {
    /// Resource kind tag, or `descriptor` for values set by the author
    pub resource_type: String,
    pub resource_name: String,
    pub owner_stack: String,
}

impl BindingSource {
    pub fn new(
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        owner_stack: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            owner_stack: owner_stack.into(),
        }
    }
}

/// One environment variable of the compute context.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub key: String,
    pub value: String,
    /// Route to a secret store instead of plaintext injection
    pub sensitive: bool,
    pub source: BindingSource,
}

impl fmt::Debug for EnvBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &str = if self.sensitive {
            "<redacted>"
        } else {
            &self.value
        };
        f.debug_struct("EnvBinding")
            .field("key", &self.key)
            .field("value", &value)
            .field("sensitive", &self.sensitive)
            .field("source", &self.source)
            .finish()
    }
}

/// Namespace of a template extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateNamespace {
    /// Resources the stack uses directly
    Resource,
    /// Resources reached through a dependency on another stack
    Dependency,
}

impl TemplateNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Dependency => "dependency",
        }
    }
}

impl fmt::Display for TemplateNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateNamespace {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(Self::Resource),
            "dependency" => Ok(Self::Dependency),
            other => Err(BindError::configuration(format!("unknown template namespace '{other}'"))),
        }
    }
}

/// Attributes of one entity, addressable from templates.
pub type Attributes = BTreeMap<String, String>;

/// The merged result of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeContext {
    /// Bindings keyed by normalized key
    pub env: BTreeMap<String, EnvBinding>,
    /// namespace -> entity -> attributes
    pub template_extensions: BTreeMap<TemplateNamespace, BTreeMap<String, Attributes>>,
}

impl ComputeContext {
    pub fn get(&self, key: &str) -> Option<&EnvBinding> {
        self.env.get(&to_env_key(key))
    }

    /// Non-sensitive variables.
    pub fn plain_env(&self) -> BTreeMap<&str, &str> {
        self.env
            .values()
            .filter(|binding| !binding.sensitive)
            .map(|binding| (binding.key.as_str(), binding.value.as_str()))
            .collect()
    }

    /// Sensitive variables, to be stored as secrets.
    pub fn secret_env(&self) -> BTreeMap<&str, &str> {
        self.env
            .values()
            .filter(|binding| binding.sensitive)
            .map(|binding| (binding.key.as_str(), binding.value.as_str()))
            .collect()
    }

    pub fn extension(&self, namespace: TemplateNamespace, entity: &str) -> Option<&Attributes> {
        self.template_extensions.get(&namespace).and_then(|entities| entities.get(entity))
    }

    /// JSON view of the context; sensitive values are masked unless `show_secrets`.
    ///
    /// Template attributes carry no sensitivity flag of their own, so an
    /// attribute is masked when its value is the value of a sensitive binding.
    pub fn to_json(&self, show_secrets: bool) -> serde_json::Value {
        let secrets: BTreeSet<&str> = if show_secrets {
            BTreeSet::new()
        } else {
            self.secret_env().into_values().collect()
        };
        let mask = |value: &str| -> String {
            if secrets.contains(value) {
                SECRET_MASK.to_string()
            } else {
                value.to_string()
            }
        };

        let env: BTreeMap<&str, serde_json::Value> = self
            .env
            .values()
            .map(|binding| {
                let value = if binding.sensitive && !show_secrets {
                    SECRET_MASK
                } else {
                    binding.value.as_str()
                };
                (
                    binding.key.as_str(),
                    serde_json::json!({
                        "value": value,
                        "sensitive": binding.sensitive,
                        "source": binding.source,
                    }),
                )
            })
            .collect();

        let extensions: BTreeMap<&TemplateNamespace, BTreeMap<&str, BTreeMap<&str, String>>> = self
            .template_extensions
            .iter()
            .map(|(namespace, entities)| {
                let entities = entities
                    .iter()
                    .map(|(entity, attributes)| {
                        let attributes = attributes
                            .iter()
                            .map(|(name, value)| (name.as_str(), mask(value)))
                            .collect();
                        (entity.as_str(), attributes)
                    })
                    .collect();
                (namespace, entities)
            })
            .collect();

        serde_json::json!({
            "env": env,
            "templateExtensions": extensions,
        })
    }
}

/// Normalize `key` to upper snake case.
pub fn to_env_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Concurrent accumulator of env bindings and template extensions.
///
/// Cloning is cheap and every clone shares the same state, so a clone can be
/// moved into each continuation that contributes to the context.
#[derive(Debug, Clone, Default)]
pub struct ComputeContextCollector {
    env: Arc<DashMap<String, EnvBinding>>,
    extensions: Arc<DashMap<(TemplateNamespace, String), Attributes>>,
}

impl ComputeContextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn binding(key: &str, value: String, sensitive: bool, source: &BindingSource) -> EnvBinding {
        EnvBinding {
            key: to_env_key(key),
            value,
            sensitive,
            source: source.clone(),
        }
    }

    /// Set `key`, replacing any existing binding.
    pub fn add_env(
        &self,
        key: &str,
        value: impl Into<String>,
        sensitive: bool,
        source: &BindingSource,
    ) {
        let binding = Self::binding(key, value.into(), sensitive, source);
        if let Some(previous) = self.env.insert(binding.key.clone(), binding) {
            debug!(
                "Env '{}' from {}/{} overwritten",
                previous.key, previous.source.resource_type, previous.source.resource_name
            );
        }
    }

    /// Set `key` unless it is already bound. Returns whether the value was stored.
    pub fn add_env_if_not_exists(
        &self,
        key: &str,
        value: impl Into<String>,
        sensitive: bool,
        source: &BindingSource,
    ) -> bool {
        let normalized = to_env_key(key);
        let mut inserted = false;
        self.env.entry(normalized).or_insert_with(|| {
            inserted = true;
            Self::binding(key, value.into(), sensitive, source)
        });
        if !inserted {
            debug!(
                "Env '{}' from {}/{} ignored, already bound",
                key, source.resource_type, source.resource_name
            );
        }
        inserted
    }

    /// Register template attributes for `entity`.
    ///
    /// Attributes already registered for the entity keep their value.
    pub fn add_template_extension(
        &self,
        namespace: TemplateNamespace,
        entity: &str,
        attributes: Attributes,
    ) {
        let mut entry = self.extensions.entry((namespace, entity.to_string())).or_default();
        for (attribute, value) in attributes {
            entry.entry(attribute).or_insert(value);
        }
    }

    pub fn contains_env(&self, key: &str) -> bool {
        self.env.contains_key(&to_env_key(key))
    }

    /// Snapshot everything collected so far.
    ///
    /// Call only after every contributing output has resolved; the collector
    /// does not wait for pending contributions.
    pub fn merge(&self) -> ComputeContext {
        let env = self
            .env
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut template_extensions: BTreeMap<TemplateNamespace, BTreeMap<String, Attributes>> =
            BTreeMap::new();
        for entry in self.extensions.iter() {
            let (namespace, entity) = entry.key();
            template_extensions
                .entry(*namespace)
                .or_default()
                .insert(entity.clone(), entry.value().clone());
        }

        ComputeContext {
            env,
            template_extensions,
        }
    }
}
