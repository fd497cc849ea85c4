//! stackbind - cross-stack resource binding for multi-cloud deployments
//!
//! Infrastructure ("parent") stacks provision shared resources such as a
//! database cluster or a bucket and export values about them. Compute ("child")
//! stacks consume those resources. stackbind computes everything a child stack
//! needs to start: it derives the identifiers the parent used, resolves the
//! parent's exports, issues a scoped credential per consumer and merges the
//! result into one compute context of environment variables, secrets and
//! template tokens.
//!
//! # Architecture Overview
//!
//! Values produced by the external provisioning engine only become known once
//! it converges. They are modelled as [`core::Output`] futures and every step
//! is a composition over them; a [`orchestrator::ProvisioningRun`] waits once,
//! at the end, before merging the context.
//!
//! # Core Modules
//!
//! - [`naming`] - Deterministic, length-bounded resource identifiers (v1 legacy, v2 hashed)
//! - [`stack`] - Stack references and export resolution
//! - [`credentials`] - Per-consumer credential grants against shared resources
//! - [`context`] - Compute context accumulation and connection URI helpers
//! - [`templating`] - `${resource:..}` / `${dependency:..}` token substitution
//!
//! ## Supporting Modules
//!
//! - [`core`] - Error types and the asynchronous [`core::Output`] value
//! - [`resources`] - Resource kinds, their configuration and binding handlers
//! - [`descriptor`] - Parent (`server.yaml`) and client (`client.yaml`) descriptors
//! - [`orchestrator`] - Provisioning runs
//! - [`config`] - Global configuration (`~/.stackbind/config.toml`)
//! - [`cli`] - Command-line interface
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Identifier of a resource
//! stackbind name --stack integrail --resource mongo-main --env test
//!
//! # Compute context of a client stack
//! stackbind plan --parent server.yaml --client client.yaml --env prod --exports exports.json
//!
//! # Substitute template tokens
//! stackbind render --parent server.yaml --client client.yaml --env prod \
//!     --exports exports.json deploy.template.yaml
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod core;
pub mod credentials;
pub mod descriptor;
pub mod naming;
pub mod orchestrator;
pub mod resources;
pub mod stack;
pub mod templating;

// Test utilities (only available in test builds)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
