//! Cross-stack export resolution.
//!
//! A compute ("child") stack reads values exported by the infrastructure
//! ("parent") stack that provisioned a shared resource. The parent is addressed
//! by a [`StackReference`]; its exports are obtained from an [`ExportSource`],
//! the seam to the external provisioning engine, as an [`Output`] that resolves
//! once the engine has converged.
//!
//! [`StackReferenceResolver`] opens at most one handle per distinct reference
//! during a provisioning run and answers lookups by composing over that handle,
//! so any number of lookups can be in flight without blocking a thread each.
//!
//! # Required and optional exports
//!
//! A missing or empty export is a [`BindError::Resolution`] when the caller
//! marks it as required; optional lookups resolve to an empty string and leave
//! the decision to the caller.

pub mod sources;

pub use sources::{FileExportSource, MemoryExportSource};

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::constants::{EXPORT_SUGGESTION_THRESHOLD, MAX_EXPORT_SUGGESTIONS, NAME_SEPARATOR};
use crate::core::{BindError, Output};

/// Exports of one stack, keyed by export name.
pub type StackExports = BTreeMap<String, String>;

/// Address of another stack's export namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackReference {
    organization: Option<String>,
    owner_stack: String,
    environment: String,
    full_reference: String,
}

impl StackReference {
    /// Reference `<owner>--<environment>`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Configuration`] when either part is empty.
    pub fn new(
        owner_stack: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, BindError> {
        Self::build(None, owner_stack.into(), environment.into())
    }

    /// Reference `<organization>/<owner>/<owner>--<environment>`.
    pub fn with_organization(
        organization: impl Into<String>,
        owner_stack: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, BindError> {
        let organization = organization.into();
        let organization = (!organization.trim().is_empty()).then_some(organization);
        Self::build(organization, owner_stack.into(), environment.into())
    }

    fn build(
        organization: Option<String>,
        owner_stack: String,
        environment: String,
    ) -> Result<Self, BindError> {
        if owner_stack.trim().is_empty() {
            return Err(BindError::configuration("stack reference has an empty owner stack"));
        }
        if environment.trim().is_empty() {
            return Err(BindError::configuration(format!(
                "stack reference to '{owner_stack}' has an empty environment"
            )));
        }

        let stack_name = format!("{owner_stack}{NAME_SEPARATOR}{environment}");
        let full_reference = match &organization {
            Some(org) => format!("{org}/{owner_stack}/{stack_name}"),
            None => stack_name,
        };

        Ok(Self {
            organization,
            owner_stack,
            environment,
            full_reference,
        })
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn owner_stack(&self) -> &str {
        &self.owner_stack
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Lookup key into the engine's export namespace.
    pub fn full_reference(&self) -> &str {
        &self.full_reference
    }
}

impl fmt::Display for StackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_reference)
    }
}

impl FromStr for StackReference {
    type Err = BindError;

    /// Parses `<owner>--<env>` or `<org>/<owner>/<owner>--<env>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let (organization, project, stack_name) = match parts.as_slice() {
            [stack_name] => (None, None, *stack_name),
            [org, project, stack_name] => (Some(*org), Some(*project), *stack_name),
            _ => {
                return Err(BindError::configuration(format!(
                    "invalid stack reference '{s}': expected '<owner>--<env>' or '<org>/<owner>/<owner>--<env>'"
                )));
            }
        };

        let (owner, env) = stack_name.rsplit_once(NAME_SEPARATOR).ok_or_else(|| {
            BindError::configuration(format!(
                "invalid stack reference '{s}': missing '{NAME_SEPARATOR}' between stack and environment"
            ))
        })?;

        if let Some(project) = project.filter(|project| *project != owner) {
            return Err(BindError::configuration(format!(
                "invalid stack reference '{s}': project '{project}' does not match stack '{owner}'"
            )));
        }

        match organization {
            Some(org) => Self::with_organization(org, owner, env),
            None => Self::new(owner, env),
        }
    }
}

/// Seam to the provisioning engine's export namespace.
pub trait ExportSource: Send + Sync {
    /// Open the exports of `reference`.
    ///
    /// The returned output fails with [`BindError::StackUnavailable`] when the
    /// stack does not exist.
    fn open(&self, reference: &StackReference) -> Output<Arc<StackExports>>;
}

/// Handle to one referenced stack, shared by every lookup against it.
#[derive(Debug, Clone)]
pub struct StackHandle {
    reference: StackReference,
    exports: Output<Arc<StackExports>>,
}

impl StackHandle {
    pub fn reference(&self) -> &StackReference {
        &self.reference
    }

    /// Look up `export_name` in this stack.
    pub fn export(&self, export_name: &str, required: bool) -> Output<String> {
        let reference = self.reference.full_reference().to_string();
        let export_name = export_name.to_string();
        self.exports
            .try_map(move |exports| lookup(&exports, &reference, &export_name, required))
    }
}

fn lookup(
    exports: &StackExports,
    reference: &str,
    export_name: &str,
    required: bool,
) -> Result<String, BindError> {
    match exports.get(export_name).filter(|value| !value.is_empty()) {
        Some(value) => Ok(value.clone()),
        None if required => Err(BindError::Resolution {
            reference: reference.to_string(),
            export: export_name.to_string(),
            suggestions: similar_keys(exports, export_name),
        }),
        None => {
            debug!("Optional export '{}' not set in '{}'", export_name, reference);
            Ok(String::new())
        }
    }
}

fn similar_keys(exports: &StackExports, export_name: &str) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = exports
        .keys()
        .map(|key| (strsim::jaro_winkler(key, export_name), key))
        .filter(|(score, _)| *score >= EXPORT_SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(MAX_EXPORT_SUGGESTIONS).map(|(_, key)| key.clone()).collect()
}

/// Resolves exports of referenced stacks for one provisioning run.
#[derive(Clone)]
pub struct StackReferenceResolver {
    source: Arc<dyn ExportSource>,
    /// One handle per full reference string.
    handles: Arc<DashMap<String, StackHandle>>,
}

impl StackReferenceResolver {
    pub fn new(source: Arc<dyn ExportSource>) -> Self {
        Self {
            source,
            handles: Arc::new(DashMap::new()),
        }
    }

    /// Get or open the handle for `reference`.
    pub fn handle(&self, reference: &StackReference) -> StackHandle {
        self.handles
            .entry(reference.full_reference().to_string())
            .or_insert_with(|| {
                debug!("Opening stack reference '{}'", reference);
                StackHandle {
                    reference: reference.clone(),
                    exports: self.source.open(reference),
                }
            })
            .clone()
    }

    /// Resolve `export_name` from `reference`.
    ///
    /// Missing or empty exports fail with [`BindError::Resolution`] when
    /// `required`, and resolve to an empty string otherwise.
    pub fn resolve(
        &self,
        reference: &StackReference,
        export_name: &str,
        required: bool,
    ) -> Output<String> {
        self.handle(reference).export(export_name, required)
    }

    /// Number of distinct stacks opened so far.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }
}

impl fmt::Debug for StackReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackReferenceResolver").field("open_handles", &self.handles.len()).finish()
    }
}
