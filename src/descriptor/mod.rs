//! Parent and client deployment descriptors.
//!
//! A **parent** descriptor (`server.yaml`) lists the shared resources an
//! infrastructure stack provisions, per environment:
//!
//! ```yaml
//! name: integrail
//! resources:
//!   prod:
//!     resources:
//!       mongo-main:
//!         type: mongodb-atlas
//!         config:
//!           namingVersion: 2
//! ```
//!
//! A **client** descriptor (`client.yaml`) describes a compute stack: which
//! parent it runs against, which parent resources it uses directly, which
//! databases of other stacks it depends on, and its own env and secrets.
//! Values may contain template tokens (see [`crate::templating`]):
//!
//! ```yaml
//! name: reports
//! stacks:
//!   prod:
//!     parent: integrail
//!     uses: [mongo-main]
//!     dependencies:
//!       - name: billing-db
//!         owner: billing
//!         resource: mongo-main
//!     env:
//!       BILLING_DB: ${dependency:billing-db.dbName}
//!     secrets:
//!       API_TOKEN: s3cr3t
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::constants::NAME_SEPARATOR;
use crate::context::to_env_key;
use crate::core::BindError;
use crate::resources::ResourceConfig;

/// Resources of one environment of a parent stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentResources {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
}

/// `server.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentDescriptor {
    /// Stack name of the parent
    pub name: String,
    /// Environment -> resources
    #[serde(default)]
    pub resources: BTreeMap<String, EnvironmentResources>,
}

/// A dependency on a database owned by another stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Name of the dependency edge; namespaces env keys and template tokens
    pub name: String,
    /// Stack owning the database
    pub owner: String,
    /// Parent resource hosting the database
    pub resource: String,
}

/// One environment of a client stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStack {
    /// Parent stack name
    pub parent: String,
    /// Parent resources used directly
    #[serde(default)]
    pub uses: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Plain env values set by the descriptor author
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Sensitive env values set by the descriptor author
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

/// `client.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptor {
    /// Stack name of the client
    pub name: String,
    /// Environment -> stack settings
    #[serde(default)]
    pub stacks: BTreeMap<String, ClientStack>,
}

async fn read_yaml<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read descriptor {}", path.display()))?;
    let parsed = serde_yaml::from_str(&content)
        .map_err(|e| BindError::DescriptorParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
        .with_context(|| format!("Invalid YAML in descriptor {}", path.display()))?;
    Ok(parsed)
}

fn unknown_environment<'a>(
    descriptor: &str,
    environment: &str,
    available: impl Iterator<Item = &'a String>,
) -> BindError {
    let available: Vec<&str> = available.map(String::as_str).collect();
    BindError::configuration(format!(
        "descriptor '{descriptor}' has no environment '{environment}' (available: {})",
        if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        }
    ))
}

impl ParentDescriptor {
    pub async fn load(path: &Path) -> Result<Self> {
        let descriptor: Self = read_yaml(path).await?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), BindError> {
        if self.name.trim().is_empty() {
            return Err(BindError::configuration("parent descriptor has an empty name"));
        }
        Ok(())
    }

    /// Resources declared for `environment`.
    pub fn environment(&self, environment: &str) -> Result<&EnvironmentResources, BindError> {
        self.resources
            .get(environment)
            .ok_or_else(|| unknown_environment(&self.name, environment, self.resources.keys()))
    }
}

impl ClientDescriptor {
    pub async fn load(path: &Path) -> Result<Self> {
        let descriptor: Self = read_yaml(path).await?;
        if descriptor.name.trim().is_empty() {
            return Err(BindError::configuration("client descriptor has an empty name").into());
        }
        Ok(descriptor)
    }

    /// Settings for `environment`.
    pub fn stack(&self, environment: &str) -> Result<&ClientStack, BindError> {
        self.stacks
            .get(environment)
            .ok_or_else(|| unknown_environment(&self.name, environment, self.stacks.keys()))
    }

    /// Check `environment` of this client against the parent's resources.
    ///
    /// Every used or depended-on resource must exist in the parent, the parent
    /// must be the one the client names, and dependency names must stay
    /// distinct once turned into environment keys.
    pub fn validate_against(
        &self,
        environment: &str,
        parent: &ParentDescriptor,
    ) -> Result<(), BindError> {
        let stack = self.stack(environment)?;
        if stack.parent != parent.name {
            return Err(BindError::configuration(format!(
                "client '{}' runs against parent '{}' but descriptor of '{}' was given",
                self.name, stack.parent, parent.name
            )));
        }

        let resources = &parent.environment(environment)?.resources;
        let missing = |resource: &str| {
            BindError::configuration(format!(
                "client '{}' references resource '{resource}' which parent '{}' does not declare in '{environment}'",
                self.name, parent.name
            ))
        };

        for resource in &stack.uses {
            if !resources.contains_key(resource) {
                return Err(missing(resource));
            }
        }

        let mut env_keys: BTreeMap<String, &str> = BTreeMap::new();
        for dependency in &stack.dependencies {
            if dependency.name.trim().is_empty() || dependency.owner.trim().is_empty() {
                return Err(BindError::configuration(format!(
                    "dependency of client '{}' on resource '{}' needs a name and an owner",
                    self.name, dependency.resource
                )));
            }
            if dependency.name.contains(NAME_SEPARATOR) || dependency.owner.contains(NAME_SEPARATOR)
            {
                return Err(BindError::configuration(format!(
                    "dependency '{}' of client '{}' (owner '{}') must not contain '{NAME_SEPARATOR}'",
                    dependency.name, self.name, dependency.owner
                )));
            }
            if dependency.owner == self.name {
                return Err(BindError::configuration(format!(
                    "dependency '{}' of client '{}' points at its own database; list the resource under 'uses' instead",
                    dependency.name, self.name
                )));
            }
            // Dependency bindings are published under `<PREFIX>_DEP_<NAME>_`.
            let key = to_env_key(&dependency.name);
            if let Some(previous) = env_keys.insert(key.clone(), dependency.name.as_str()) {
                return Err(if previous == dependency.name {
                    BindError::configuration(format!(
                        "dependency name '{}' is declared twice in client '{}'",
                        dependency.name, self.name
                    ))
                } else {
                    BindError::configuration(format!(
                        "dependencies '{previous}' and '{}' of client '{}' both map to environment key '{key}'",
                        dependency.name, self.name
                    ))
                });
            }
            if !resources.contains_key(&dependency.resource) {
                return Err(missing(&dependency.resource));
            }
        }
        Ok(())
    }
}
