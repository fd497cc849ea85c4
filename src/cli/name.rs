//! Compute resource identifiers.
//!
//! ```bash
//! stackbind name --stack integrail --resource mongo-main --env test --version 1
//! integrail---main--test
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::GlobalConfig;
use crate::naming::{self, NamingVersion, ResourceIdentity};
use crate::resources::ResourceKind;

/// Print the identifier a parent stack gives a resource.
#[derive(Args, Debug)]
pub struct NameCommand {
    /// Owner (parent) stack
    #[arg(long)]
    stack: String,

    /// Resource name in the parent descriptor
    #[arg(long)]
    resource: String,

    /// Environment
    #[arg(long, short = 'e')]
    env: Option<String>,

    /// Naming version (1 = legacy, 2 = hashed); defaults to the configured version
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    version: Option<u8>,

    /// Explicit identifier
    #[arg(long = "override", value_name = "NAME")]
    name_override: Option<String>,

    /// Resource type whose length limit applies
    #[arg(long = "type", value_name = "TYPE", default_value = "mongodb-atlas")]
    kind: String,

    /// Length limit, replacing the type's limit
    #[arg(long)]
    max_len: Option<usize>,
}

impl NameCommand {
    pub fn execute(self, config: &GlobalConfig) -> Result<()> {
        let kind: ResourceKind = self.kind.parse()?;
        let version = match self.version {
            Some(version) => NamingVersion::try_from(version).map_err(anyhow::Error::msg)?,
            None => config.default_naming_version,
        };
        let max_len = self.max_len.unwrap_or_else(|| config.max_name_length(kind));

        let mut identity = ResourceIdentity::new(self.stack, self.resource)
            .with_version(version)
            .with_override(self.name_override);
        if let Some(env) = self.env {
            identity = identity.with_environment(env);
        }

        println!("{}", naming::name(&identity, max_len)?);
        Ok(())
    }
}
