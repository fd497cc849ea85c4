//! stackbind CLI entry point
//!
//! Parses arguments, runs the command and displays errors with context and
//! suggestions:
//! - `name` - Compute a resource identifier
//! - `plan` - Bind a client stack and print its compute context
//! - `render` - Substitute template tokens in a file

use anyhow::Result;
use clap::Parser;
use stackbind_cli::cli;
use stackbind_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
