//! Deterministic, length-constrained resource identifiers.
//!
//! Parent stacks name the resources they provision, and child stacks recompute
//! the very same names to find the parent's exports. Naming must therefore be a
//! pure function of the [`ResourceIdentity`]: identical inputs always yield the
//! identical identifier, and the identifier never exceeds the length limit of
//! the system it names (Atlas cluster names, for example, are capped at 23
//! characters).
//!
//! # Versions
//!
//! - [`NamingVersion::Legacy`] (v1) joins `owner--resource[--environment]` and,
//!   when too long, keeps an equal-length head and tail around a `--`
//!   separator. Distinct resources can collapse to the same v1 name. The rule
//!   is frozen so that already-provisioned resources keep their names.
//! - [`NamingVersion::Hashed`] (v2, default) keeps a prefix of the owner stack
//!   and of the resource name and appends a short SHA-256 digest of the full
//!   logical name, so names sharing a truncated prefix still differ.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackbind_cli::naming::{NamingVersion, ResourceIdentity, name};
//!
//! # fn example() -> Result<(), stackbind_cli::core::BindError> {
//! let legacy = ResourceIdentity::new("integrail", "mongo-main")
//!     .with_environment("test")
//!     .with_version(NamingVersion::Legacy);
//! assert_eq!(name(&legacy, 23)?, "integrail---main--test");
//!
//! let hashed = ResourceIdentity::new("integrail", "mongodb-pool-dedicated-1");
//! assert_eq!(name(&hashed, 23)?, "integrail--mongodb-ae64");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

use crate::constants::{
    LEGACY_TRUNCATION_SEPARATOR, MIN_NAME_LENGTH, NAME_HASH_LENGTH, NAME_SEPARATOR,
};
use crate::core::BindError;

/// Naming rule applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NamingVersion {
    /// Middle truncation kept for already-provisioned resources.
    Legacy,
    /// Prefix truncation with a digest suffix.
    #[default]
    Hashed,
}

impl TryFrom<u8> for NamingVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Legacy),
            2 => Ok(Self::Hashed),
            other => Err(format!("unsupported naming version {other} (expected 1 or 2)")),
        }
    }
}

impl From<NamingVersion> for u8 {
    fn from(version: NamingVersion) -> Self {
        match version {
            NamingVersion::Legacy => 1,
            NamingVersion::Hashed => 2,
        }
    }
}

impl fmt::Display for NamingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u8::from(*self))
    }
}

/// Everything that determines a resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    /// Stack that provisions the resource
    pub owner_stack: String,
    /// Resource name as declared in the descriptor
    pub resource_name: String,
    /// Environment the resource belongs to; may be empty
    pub environment: String,
    /// Rule used to derive the identifier
    pub naming_version: NamingVersion,
    /// Identifier chosen explicitly by the descriptor author
    pub explicit_override: Option<String>,
}

impl ResourceIdentity {
    /// Identity with no environment, the default naming version and no override.
    pub fn new(owner_stack: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            owner_stack: owner_stack.into(),
            resource_name: resource_name.into(),
            environment: String::new(),
            naming_version: NamingVersion::default(),
            explicit_override: None,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: NamingVersion) -> Self {
        self.naming_version = version;
        self
    }

    #[must_use]
    pub fn with_override(mut self, name: Option<String>) -> Self {
        self.explicit_override = name;
        self
    }

    /// The full, untruncated name: `owner--resource[--environment]`.
    pub fn logical_name(&self) -> String {
        let mut logical =
            format!("{}{NAME_SEPARATOR}{}", self.owner_stack, self.resource_name);
        if !self.environment.is_empty() {
            logical.push_str(NAME_SEPARATOR);
            logical.push_str(&self.environment);
        }
        logical
    }
}

/// Derive the identifier for `identity`, at most `max_len` characters long.
///
/// # Errors
///
/// Returns [`BindError::Naming`] when the owner stack or resource name is empty,
/// or when `max_len` is below [`MIN_NAME_LENGTH`].
pub fn name(identity: &ResourceIdentity, max_len: usize) -> Result<String, BindError> {
    validate(identity, max_len)?;

    let explicit = identity
        .explicit_override
        .as_deref()
        .map(sanitize_separators)
        .filter(|candidate| !candidate.is_empty());

    if let Some(explicit) = explicit {
        if explicit.chars().count() <= max_len {
            return Ok(explicit);
        }
        debug!(
            "Override '{}' exceeds {} characters, truncating with {} rule",
            explicit, max_len, identity.naming_version
        );
        return Ok(match identity.naming_version {
            NamingVersion::Legacy => trim_middle(&explicit, max_len, LEGACY_TRUNCATION_SEPARATOR),
            NamingVersion::Hashed => truncate_with_hash(&explicit, max_len),
        });
    }

    let logical = identity.logical_name();
    Ok(match identity.naming_version {
        NamingVersion::Legacy => trim_middle(&logical, max_len, LEGACY_TRUNCATION_SEPARATOR),
        NamingVersion::Hashed => hashed_name(identity, &logical, max_len),
    })
}

fn validate(identity: &ResourceIdentity, max_len: usize) -> Result<(), BindError> {
    let reason = if identity.owner_stack.trim().is_empty() {
        Some("owner stack is empty".to_string())
    } else if identity.resource_name.trim().is_empty() {
        Some("resource name is empty".to_string())
    } else if max_len < MIN_NAME_LENGTH {
        Some(format!("length limit {max_len} is below the minimum of {MIN_NAME_LENGTH}"))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BindError::Naming {
            stack: identity.owner_stack.clone(),
            resource: identity.resource_name.clone(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Replace separator-like characters with `-`.
pub fn sanitize_separators(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '_' | '.' | '/' | ':' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect()
}

/// Legacy middle truncation.
///
/// Keeps `(max_len - sep.len()) / 2` characters on each side of `sep`. When the
/// remainder is odd the result is one character shorter than `max_len`.
pub fn trim_middle(value: &str, max_len: usize, sep: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max_len {
        return value.to_string();
    }

    let keep = max_len.saturating_sub(sep.chars().count()) / 2;
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{head}{sep}{tail}")
}

/// First [`NAME_HASH_LENGTH`] hex characters of the SHA-256 of `value`.
pub fn short_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(NAME_HASH_LENGTH);
    encoded
}

fn hashed_name(identity: &ResourceIdentity, logical: &str, max_len: usize) -> String {
    let hash = short_hash(logical);
    // owner + "--" + resource + "-" + hash
    let budget = max_len - NAME_SEPARATOR.len() - 1 - NAME_HASH_LENGTH;
    let resource_reserve = (budget / 2).min(NAME_HASH_LENGTH);
    let owner_len = identity.owner_stack.chars().count().min(budget - resource_reserve);
    let resource_len = budget - owner_len;

    let owner = prefix(&identity.owner_stack, owner_len);
    let resource = prefix(&identity.resource_name, resource_len);

    if resource.is_empty() {
        format!("{owner}{NAME_SEPARATOR}{hash}")
    } else {
        format!("{owner}{NAME_SEPARATOR}{resource}-{hash}")
    }
}

fn truncate_with_hash(value: &str, max_len: usize) -> String {
    let hash = short_hash(value);
    let head = prefix(value, max_len - 1 - NAME_HASH_LENGTH);
    format!("{head}-{hash}")
}

fn prefix(value: &str, len: usize) -> String {
    let head: String = value.chars().take(len).collect();
    head.trim_end_matches('-').to_string()
}
