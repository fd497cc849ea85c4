//! Command-line interface for stackbind.
//!
//! # Commands
//!
//! - `name` - Compute the identifier of a resource under a naming version
//! - `plan` - Bind a client stack against its parent and print the compute context
//! - `render` - Substitute template tokens in a file with a client's bindings
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - No logging
//! - `--config` / `-c` - Global configuration file (also `STACKBIND_CONFIG`)
//!
//! `RUST_LOG` takes precedence over both logging flags.

mod common;
mod name;
mod plan;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::GlobalConfig;

/// Main CLI structure.
#[derive(Parser)]
#[command(
    name = "stackbind",
    about = "Bind shared infrastructure into compute stacks",
    version,
    long_about = "stackbind derives resource identifiers, resolves cross-stack exports, issues \
                  per-consumer credentials and merges them into one compute context."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the global configuration file
    #[arg(short, long, global = true, env = "STACKBIND_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a resource identifier
    Name(name::NameCommand),

    /// Bind a client stack and print its compute context
    Plan(plan::PlanCommand),

    /// Render template tokens in a file
    Render(render::RenderCommand),
}

impl Cli {
    /// Initialize logging, load the global configuration and run the command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = GlobalConfig::load_with_optional(self.config.clone()).await?;

        match self.command {
            Commands::Name(cmd) => cmd.execute(&config),
            Commands::Plan(cmd) => cmd.execute(&config).await,
            Commands::Render(cmd) => cmd.execute(&config).await,
        }
    }

    fn log_filter(&self) -> Option<EnvFilter> {
        if std::env::var("RUST_LOG").is_ok() {
            return Some(EnvFilter::from_default_env());
        }
        if self.quiet {
            None
        } else if self.verbose {
            Some(EnvFilter::new("stackbind_cli=debug"))
        } else {
            Some(EnvFilter::new("stackbind_cli=warn"))
        }
    }

    fn init_logging(&self) {
        if let Some(filter) = self.log_filter() {
            // Logs go to stderr so JSON output on stdout stays parseable.
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
        }
    }
}
