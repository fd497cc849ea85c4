//! Arguments and run setup shared by `plan` and `render`.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::credentials::MemoryCredentialBackend;
use crate::descriptor::{ClientDescriptor, ParentDescriptor};
use crate::orchestrator::{ProvisioningRun, RunOutcome};
use crate::resources::ResourceRegistry;
use crate::stack::FileExportSource;

/// Inputs of one provisioning run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Parent descriptor (server.yaml)
    #[arg(long, value_name = "FILE")]
    pub parent: PathBuf,

    /// Client descriptor (client.yaml)
    #[arg(long, value_name = "FILE")]
    pub client: PathBuf,

    /// Environment to bind
    #[arg(long, short = 'e', value_name = "ENV")]
    pub env: String,

    /// JSON snapshot of the parent's exports
    #[arg(long, value_name = "FILE")]
    pub exports: PathBuf,
}

impl RunArgs {
    /// Load the inputs and settle a run against an in-memory credential backend.
    pub async fn run(&self, config: &GlobalConfig) -> Result<RunOutcome> {
        let (parent, client, source) = tokio::try_join!(
            ParentDescriptor::load(&self.parent),
            ClientDescriptor::load(&self.client),
            FileExportSource::load(&self.exports),
        )?;

        let run = ProvisioningRun::new(
            &client.name,
            &self.env,
            Arc::new(ResourceRegistry::builtin()),
            Arc::new(source),
            Arc::new(MemoryCredentialBackend::new()),
            config,
        );
        debug!("Starting run {} for '{}' in '{}'", run.run_id(), client.name, self.env);

        let outcome = run.execute(&parent, &client).await.with_context(|| {
            format!("Failed to bind client '{}' in environment '{}'", client.name, self.env)
        })?;
        Ok(outcome)
    }
}
