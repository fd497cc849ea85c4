//! Bind a client stack and print the resulting compute context.
//!
//! Credentials are issued against an in-memory backend, so `plan` shows what a
//! run would produce without touching real infrastructure. Sensitive values are
//! masked unless `--show-secrets` is given.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use super::common::RunArgs;
use crate::config::GlobalConfig;
use crate::constants::SECRET_MASK;
use crate::orchestrator::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Print the compute context of a client stack.
#[derive(Args, Debug)]
pub struct PlanCommand {
    #[command(flatten)]
    run: RunArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print sensitive values in clear
    #[arg(long)]
    show_secrets: bool,
}

impl PlanCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let outcome = self.run.run(config).await?;
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&to_json(&outcome, self.show_secrets))?);
            }
            OutputFormat::Text => print_text(&outcome, self.show_secrets),
        }
        Ok(())
    }
}

fn to_json(outcome: &RunOutcome, show_secrets: bool) -> serde_json::Value {
    serde_json::json!({
        "runId": outcome.run_id,
        "stack": outcome.stack,
        "environment": outcome.environment,
        "startedAt": outcome.started_at,
        "finishedAt": outcome.finished_at,
        "bindings": outcome.bindings,
        "context": outcome.context.to_json(show_secrets),
    })
}

fn print_text(outcome: &RunOutcome, show_secrets: bool) {
    println!(
        "{} {} ({}) run {} at {}",
        "Compute context for".bold(),
        outcome.stack.cyan(),
        outcome.environment,
        outcome.run_id,
        outcome.finished_at.to_rfc3339()
    );
    println!("  {} resource binding(s)\n", outcome.bindings);

    println!("{}", "Environment:".bold());
    for binding in outcome.context.env.values() {
        let value = if binding.sensitive && !show_secrets {
            SECRET_MASK.dimmed().to_string()
        } else {
            binding.value.clone()
        };
        let marker = if binding.sensitive {
            " (secret)".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}={}{}  {}",
            binding.key.green(),
            value,
            marker,
            format!("<- {}/{}", binding.source.resource_type, binding.source.resource_name).dimmed()
        );
    }

    if !outcome.context.template_extensions.is_empty() {
        println!("\n{}", "Template tokens:".bold());
        for (namespace, entities) in &outcome.context.template_extensions {
            for (entity, attributes) in entities {
                let names: Vec<&str> = attributes.keys().map(String::as_str).collect();
                println!("  ${{{namespace}:{entity}.<{}>}}", names.join("|"));
            }
        }
    }
}
