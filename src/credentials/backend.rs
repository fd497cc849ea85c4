//! Seam to the engine that materializes database users.
//!
//! The provisioner never talks to a cloud API itself. It hands a
//! [`UserRequest`] to a [`CredentialBackend`], which must upsert by
//! [`UserRequest::object_name`]: a second request for the same object name
//! updates the existing user instead of creating another one.

use dashmap::DashMap;
use std::fmt;

use super::RoleBinding;
use crate::core::{BindError, Output};

/// A user to create or update in the backing resource.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRequest {
    /// Stable name of the user object in the provisioning engine
    pub object_name: String,
    /// Project (account) the backing resource lives in
    pub project_id: String,
    /// Database user name
    pub username: String,
    /// Generated secret
    pub password: String,
    /// Roles granted to the user
    pub roles: Vec<RoleBinding>,
}

impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRequest")
            .field("object_name", &self.object_name)
            .field("project_id", &self.project_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// What the backend reports after an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub object_name: String,
    pub username: String,
    /// 1 on creation, incremented on every update
    pub revision: u64,
}

/// Creates or updates database users.
pub trait CredentialBackend: Send + Sync {
    fn upsert_user(&self, request: UserRequest) -> Output<UserRecord>;
}

/// Backend that keeps users in memory.
///
/// Used for dry-run planning and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialBackend {
    users: DashMap<String, (UserRequest, u64)>,
    failure: Option<String>,
}

impl MemoryCredentialBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that rejects every request with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            users: DashMap::new(),
            failure: Some(reason.into()),
        }
    }

    /// The stored request for `object_name`.
    pub fn user(&self, object_name: &str) -> Option<UserRequest> {
        self.users.get(object_name).map(|entry| entry.0.clone())
    }

    /// Object names of all stored users, sorted.
    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialBackend for MemoryCredentialBackend {
    fn upsert_user(&self, request: UserRequest) -> Output<UserRecord> {
        if let Some(reason) = &self.failure {
            return Output::failed(BindError::Other {
                message: reason.clone(),
            });
        }

        let object_name = request.object_name.clone();
        let username = request.username.clone();
        let mut entry = self.users.entry(object_name.clone()).or_insert((request.clone(), 0));
        entry.0 = request;
        entry.1 += 1;

        Output::ready(UserRecord {
            object_name,
            username,
            revision: entry.1,
        })
    }
}
