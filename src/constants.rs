//! Global constants used throughout the stackbind codebase.
//!
//! Naming limits, credential policy values and export key suffixes live here so
//! the parent and child sides of a binding always agree on them.

/// Separator between the components of a logical resource name.
pub const NAME_SEPARATOR: &str = "--";

/// Separator inserted by legacy (v1) middle truncation.
///
/// Frozen: changing it renames every already-provisioned v1 resource.
pub const LEGACY_TRUNCATION_SEPARATOR: &str = "--";

/// Number of hex characters of the v2 naming hash suffix.
pub const NAME_HASH_LENGTH: usize = 4;

/// Smallest length limit accepted by the naming strategy.
pub const MIN_NAME_LENGTH: usize = 8;

/// Default length of generated credential secrets.
pub const DEFAULT_PASSWORD_LENGTH: usize = 20;

/// Shortest secret the provisioner will generate.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Characters allowed in generated secrets; none need escaping inside a URI.
pub const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Placeholder printed instead of sensitive values.
pub const SECRET_MASK: &str = "********";

/// Database holding replication metadata, readable by direct consumers.
pub const OPERATIONAL_DATABASE: &str = "local";

/// Marker placed between consumer and owner in dependency usernames.
pub const DEPENDENCY_MARKER: &str = "dep";

/// Export key suffixes published by parent stacks.
pub mod export_suffix {
    /// Project (or account) identifier
    pub const PROJECT_ID: &str = "id";
    /// Cluster identifier
    pub const CLUSTER_ID: &str = "cluster-id";
    /// Base MongoDB connection URI without credentials
    pub const MONGO_URI: &str = "mongo-uri";
    /// Extra query options for the MongoDB URI
    pub const MONGO_URI_OPTIONS: &str = "mongo-uri-options";
    /// Service user created by the parent stack
    pub const SERVICE_USER: &str = "service-user";
    /// Database host name
    pub const HOST: &str = "host";
    /// Database port
    pub const PORT: &str = "port";
    /// Administrative user of the database instance
    pub const ROOT_USER: &str = "root-user";
    /// Bucket name
    pub const BUCKET_NAME: &str = "bucket-name";
    /// Region the resource lives in
    pub const REGION: &str = "region";
}

/// Environment variable overriding the global configuration path.
pub const CONFIG_ENV_VAR: &str = "STACKBIND_CONFIG";

/// Number of export-key suggestions shown for a missing export.
pub const MAX_EXPORT_SUGGESTIONS: usize = 3;

/// Minimum similarity for an export key to be suggested.
pub const EXPORT_SUGGESTION_THRESHOLD: f64 = 0.7;
