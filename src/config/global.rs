//! Global (user-wide) configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_PASSWORD_LENGTH, MIN_NAME_LENGTH};
use crate::core::BindError;
use crate::naming::NamingVersion;
use crate::resources::ResourceKind;

const fn default_password_length() -> usize {
    DEFAULT_PASSWORD_LENGTH
}

fn is_default_password_length(length: &usize) -> bool {
    *length == DEFAULT_PASSWORD_LENGTH
}

/// User-wide defaults for every provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Organization qualifying stack references (`<org>/<owner>/<owner>--<env>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Naming version for resources that do not pin one
    #[serde(default)]
    pub default_naming_version: NamingVersion,

    /// Length of generated credential secrets
    #[serde(
        default = "default_password_length",
        skip_serializing_if = "is_default_password_length"
    )]
    pub password_length: usize,

    /// Identifier length limit per resource kind, replacing the kind's default
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub max_name_lengths: BTreeMap<ResourceKind, usize>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            organization: None,
            default_naming_version: NamingVersion::default(),
            password_length: DEFAULT_PASSWORD_LENGTH,
            max_name_lengths: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, else from `STACKBIND_CONFIG`, else from the
    /// default location. A missing file yields the defaults.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => match std::env::var_os(CONFIG_ENV_VAR) {
                Some(path) => PathBuf::from(path),
                None => Self::default_path()?,
            },
        };

        if fs::try_exists(&path).await.unwrap_or(false) {
            Self::load_from(&path).await
        } else {
            debug!("No global config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid global config in {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))
    }

    /// `~/.stackbind/config.toml`, or `%LOCALAPPDATA%\stackbind\config.toml` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("stackbind")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".stackbind")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Identifier length limit for `kind`.
    pub fn max_name_length(&self, kind: ResourceKind) -> usize {
        self.max_name_lengths
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_max_name_length())
    }

    pub fn validate(&self) -> Result<(), BindError> {
        if let Some((kind, limit)) =
            self.max_name_lengths.iter().find(|(_, limit)| **limit < MIN_NAME_LENGTH)
        {
            return Err(BindError::configuration(format!(
                "max_name_lengths.{kind} = {limit} is below the minimum of {MIN_NAME_LENGTH}"
            )));
        }
        if self.organization.as_deref().is_some_and(|org| org.contains('/')) {
            return Err(BindError::configuration("organization must not contain '/'"));
        }
        Ok(())
    }
}
