//! Template token substitution for deployment descriptors.
//!
//! Once a provisioning run has settled, the template extensions registered by
//! resource handlers become addressable from descriptor text:
//!
//! ```text
//! MONGO_URL=${resource:mongo-main.uri}
//! REPORTS_DB=${dependency:billing-db.dbName}
//! ```
//!
//! A token is `${<namespace>:<entity>.<attribute>}` where the namespace is
//! `resource` or `dependency`. Attribute names are whatever the resource kind
//! registered (`uri`, `user`, `password`, `dbName`, `oplogUri`, ...); the
//! registry does not know them in advance.
//!
//! # Fallback
//!
//! Descriptors are rendered broadly and most tokens in a document belong to
//! some other resolver. A token whose namespace, entity or attribute is unknown
//! is therefore left exactly as written, never replaced by an empty string and
//! never turned into an error.
//!
//! ```rust
//! use stackbind_cli::context::{Attributes, ComputeContextCollector, TemplateNamespace};
//! use stackbind_cli::templating::TemplateExtensionRegistry;
//!
//! let collector = ComputeContextCollector::new();
//! collector.add_template_extension(
//!     TemplateNamespace::Resource,
//!     "mongo-main",
//!     Attributes::from([("dbName".to_string(), "billing".to_string())]),
//! );
//! let registry = TemplateExtensionRegistry::from_context(&collector.merge());
//!
//! assert_eq!(registry.resolve("${resource:mongo-main.dbName}"), "billing");
//! assert_eq!(registry.resolve("${resource:mongo-main.port}"), "${resource:mongo-main.port}");
//! ```

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::context::{Attributes, ComputeContext, TemplateNamespace};

// `${<namespace>:<entity>.<attribute>}`
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-z]+):([^.}\s]+)\.([^}\s]+)\}")
        .expect("TOKEN_REGEX: invalid regex pattern")
});

/// Read-only view of the template extensions of one settled run.
#[derive(Debug, Clone, Default)]
pub struct TemplateExtensionRegistry {
    extensions: BTreeMap<TemplateNamespace, BTreeMap<String, Attributes>>,
}

impl TemplateExtensionRegistry {
    pub fn from_context(context: &ComputeContext) -> Self {
        Self {
            extensions: context.template_extensions.clone(),
        }
    }

    /// Value of `attribute` on `entity`, if registered.
    pub fn lookup(
        &self,
        namespace: TemplateNamespace,
        entity: &str,
        attribute: &str,
    ) -> Option<&str> {
        self.extensions
            .get(&namespace)
            .and_then(|entities| entities.get(entity))
            .and_then(|attributes| attributes.get(attribute))
            .map(String::as_str)
    }

    /// Resolve a single token, returning it unchanged when it cannot be resolved.
    pub fn resolve(&self, token: &str) -> String {
        match TOKEN_REGEX.captures(token) {
            Some(caps) if caps.get(0).is_some_and(|m| m.as_str() == token) => {
                self.substitute(&caps)
            }
            _ => token.to_string(),
        }
    }

    /// Substitute every resolvable token in `document`.
    pub fn render(&self, document: &str) -> String {
        TOKEN_REGEX.replace_all(document, |caps: &Captures| self.substitute(caps)).into_owned()
    }

    fn substitute(&self, caps: &Captures) -> String {
        let token = &caps[0];
        let Ok(namespace) = caps[1].parse::<TemplateNamespace>() else {
            return token.to_string();
        };
        match self.lookup(namespace, &caps[2], &caps[3]) {
            Some(value) => value.to_string(),
            None => {
                debug!("Template token '{}' left unresolved", token);
                token.to_string()
            }
        }
    }
}
