//! Render template tokens in a file.
//!
//! Runs the same binding as `plan` and substitutes every
//! `${resource:<name>.<attr>}` / `${dependency:<name>.<attr>}` token the run
//! can resolve. Unresolvable tokens are left as written.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use super::common::RunArgs;
use crate::config::GlobalConfig;
use crate::templating::TemplateExtensionRegistry;

/// Substitute template tokens in a file.
#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    run: RunArgs,

    /// Template file to render
    #[arg(value_name = "TEMPLATE")]
    template: PathBuf,

    /// Write the result here instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

impl RenderCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let template = fs::read_to_string(&self.template)
            .await
            .with_context(|| format!("Failed to read template {}", self.template.display()))?;

        let outcome = self.run.run(config).await?;
        let rendered = TemplateExtensionRegistry::from_context(&outcome.context).render(&template);

        match &self.output {
            Some(path) => {
                fs::write(path, rendered)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Rendered {} to {} (run {})", self.template.display(), path.display(), outcome.run_id);
            }
            None => print!("{rendered}"),
        }
        Ok(())
    }
}
