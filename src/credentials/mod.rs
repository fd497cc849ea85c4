//! Per-consumer scoped credentials against shared backing resources.
//!
//! One database cluster typically serves many applications. Each consuming
//! stack gets its own [`CredentialGrant`]: a freshly generated secret plus the
//! minimum set of roles it needs. The grant's username and the name of the
//! underlying user object are derived from the backing resource and the
//! consumer identity only, so provisioning the same consumer again updates the
//! existing user in place instead of creating a second one.
//!
//! # Consumers
//!
//! - A **direct** consumer uses a resource of its parent stack. It gets
//!   `readWrite` and `dbAdmin` on its own database and `read` on the shared
//!   operational database holding replication metadata.
//! - A **dependency** consumer reaches into the database owned by another
//!   stack. It gets `readWrite` on the owner's database under a username that
//!   records both sides of the dependency.
//!
//! # Ordering
//!
//! The backing resource must exist before a user can reference it. Callers pass
//! that precondition as a `depends_on` output; the backend is only called after
//! it resolves.

pub mod backend;
pub mod password;

pub use backend::{CredentialBackend, MemoryCredentialBackend, UserRecord, UserRequest};
pub use password::generate_password;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_PASSWORD_LENGTH, DEPENDENCY_MARKER, MIN_PASSWORD_LENGTH, NAME_SEPARATOR,
    OPERATIONAL_DATABASE,
};
use crate::core::{BindError, Output};

/// How a consumer relates to the backing resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConsumerKind {
    /// The consumer uses a resource of its parent stack.
    Direct,
    /// The consumer depends on a database owned by another stack.
    Dependency {
        /// Stack owning the database
        owner_stack: String,
        /// Name of the dependency edge in the consumer's descriptor
        dependency_name: String,
    },
}

/// The stack a credential is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity {
    pub stack: String,
    pub environment: String,
    pub kind: ConsumerKind,
}

impl ConsumerIdentity {
    pub fn direct(stack: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            environment: environment.into(),
            kind: ConsumerKind::Direct,
        }
    }

    pub fn dependency(
        stack: impl Into<String>,
        environment: impl Into<String>,
        owner_stack: impl Into<String>,
        dependency_name: impl Into<String>,
    ) -> Self {
        Self {
            stack: stack.into(),
            environment: environment.into(),
            kind: ConsumerKind::Dependency {
                owner_stack: owner_stack.into(),
                dependency_name: dependency_name.into(),
            },
        }
    }

    /// Database user name for this consumer.
    pub fn username(&self) -> String {
        match &self.kind {
            ConsumerKind::Direct => self.stack.clone(),
            ConsumerKind::Dependency {
                owner_stack,
                dependency_name,
            } => [self.stack.as_str(), DEPENDENCY_MARKER, owner_stack.as_str(), dependency_name.as_str()]
                .join(NAME_SEPARATOR),
        }
    }

    /// Database the consumer's roles are scoped to.
    pub fn database(&self) -> &str {
        match &self.kind {
            ConsumerKind::Direct => &self.stack,
            ConsumerKind::Dependency {
                owner_stack,
                ..
            } => owner_stack,
        }
    }

    fn validate(&self) -> Result<(), BindError> {
        if self.stack.trim().is_empty() {
            return Err(BindError::configuration("consumer stack name is empty"));
        }
        if let ConsumerKind::Dependency {
            owner_stack,
            dependency_name,
        } = &self.kind
        {
            if owner_stack.trim().is_empty() || dependency_name.trim().is_empty() {
                return Err(BindError::configuration(format!(
                    "dependency of stack '{}' needs both an owner stack and a name",
                    self.stack
                )));
            }
            // The separator delimits the user name segments.
            if owner_stack.contains(NAME_SEPARATOR) || dependency_name.contains(NAME_SEPARATOR) {
                return Err(BindError::configuration(format!(
                    "dependency '{dependency_name}' of stack '{}' on '{owner_stack}' must not contain '{NAME_SEPARATOR}'",
                    self.stack
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConsumerKind::Direct => write!(f, "{}/{}", self.stack, self.environment),
            ConsumerKind::Dependency {
                owner_stack,
                dependency_name,
            } => write!(
                f,
                "{}/{} (dependency '{}' on {})",
                self.stack, self.environment, dependency_name, owner_stack
            ),
        }
    }
}

/// A role granted within one database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleBinding {
    /// Database (namespace) the role applies to
    pub scope_name: String,
    pub role: String,
}

impl RoleBinding {
    pub fn new(scope_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            scope_name: scope_name.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for RoleBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.scope_name)
    }
}

/// Roles a consumer receives by default.
pub fn default_roles(consumer: &ConsumerIdentity) -> Vec<RoleBinding> {
    let database = consumer.database();
    match consumer.kind {
        ConsumerKind::Direct => vec![
            RoleBinding::new(database, "readWrite"),
            RoleBinding::new(database, "dbAdmin"),
            RoleBinding::new(OPERATIONAL_DATABASE, "read"),
        ],
        ConsumerKind::Dependency {
            ..
        } => vec![RoleBinding::new(database, "readWrite")],
    }
}

/// The shared resource a grant is issued against.
#[derive(Debug, Clone)]
pub struct BackingResource {
    /// Identifier of the resource (for example the cluster name)
    pub identifier: String,
    /// Project the resource belongs to, as exported by its owner
    pub project_id: Output<String>,
}

/// A scoped credential issued to one consumer.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialGrant {
    /// Stable name of the underlying user object
    pub object_name: String,
    pub username: String,
    pub password: String,
    pub role_bindings: Vec<RoleBinding>,
    /// Identifier of the backing resource
    pub backing_resource_ref: String,
}

impl fmt::Debug for CredentialGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialGrant")
            .field("object_name", &self.object_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role_bindings", &self.role_bindings)
            .field("backing_resource_ref", &self.backing_resource_ref)
            .finish()
    }
}

/// Name of the user object for `consumer` on `backing_identifier`.
pub fn credential_object_name(backing_identifier: &str, consumer: &ConsumerIdentity) -> String {
    format!("{backing_identifier}{NAME_SEPARATOR}{}", consumer.username())
}

/// Issues credential grants through a [`CredentialBackend`].
#[derive(Clone)]
pub struct CredentialProvisioner {
    backend: Arc<dyn CredentialBackend>,
    password_length: usize,
}

impl CredentialProvisioner {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self {
            backend,
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }

    /// Use secrets of `length` characters (at least [`MIN_PASSWORD_LENGTH`]).
    #[must_use]
    pub fn with_password_length(mut self, length: usize) -> Self {
        self.password_length = length.max(MIN_PASSWORD_LENGTH);
        self
    }

    /// Issue a grant for `consumer` on `backing`.
    ///
    /// Inputs are validated immediately; the backend is called only after
    /// `depends_on` and the backing project id have resolved.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Configuration`] for an empty consumer, backing
    /// identifier or role set. The returned output fails with
    /// [`BindError::Provisioning`] if the backend rejects the grant, and with
    /// the error of `depends_on` if that fails first.
    pub fn grant(
        &self,
        consumer: &ConsumerIdentity,
        backing: &BackingResource,
        roles: Vec<RoleBinding>,
        depends_on: Output<()>,
    ) -> Result<Output<CredentialGrant>, BindError> {
        consumer.validate()?;
        if backing.identifier.trim().is_empty() {
            return Err(BindError::configuration(format!(
                "backing resource for consumer '{consumer}' has no identifier"
            )));
        }
        if roles.is_empty() {
            return Err(BindError::configuration(format!(
                "no roles requested for consumer '{consumer}' on '{}'",
                backing.identifier
            )));
        }
        if let Some(bad) =
            roles.iter().find(|r| r.role.trim().is_empty() || r.scope_name.trim().is_empty())
        {
            return Err(BindError::configuration(format!(
                "role binding '{bad}' for consumer '{consumer}' is incomplete"
            )));
        }

        let object_name = credential_object_name(&backing.identifier, consumer);
        let username = consumer.username();
        let password = generate_password(self.password_length);
        let backing_ref = backing.identifier.clone();
        let consumer_label = consumer.to_string();
        let backend = Arc::clone(&self.backend);

        debug!("Scheduling credential '{}' for {}", object_name, consumer_label);

        Ok(depends_on.zip(&backing.project_id).and_then(move |((), project_id)| async move {
            let request = UserRequest {
                object_name: object_name.clone(),
                project_id,
                username: username.clone(),
                password: password.clone(),
                roles: roles.clone(),
            };
            let record = backend.upsert_user(request).await.map_err(|e| BindError::Provisioning {
                consumer: consumer_label.clone(),
                backing: backing_ref.clone(),
                reason: e.to_string(),
            })?;

            info!(
                "Credential '{}' for {} at revision {}",
                record.object_name, consumer_label, record.revision
            );
            Ok::<_, BindError>(CredentialGrant {
                object_name,
                username,
                password,
                role_bindings: roles,
                backing_resource_ref: backing_ref,
            })
        }))
    }
}

impl fmt::Debug for CredentialProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvisioner")
            .field("password_length", &self.password_length)
            .finish_non_exhaustive()
    }
}
