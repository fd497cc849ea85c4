//! Integration test suite for stackbind
//!
//! End-to-end tests of whole provisioning runs and of the `stackbind` binary.
//! Fixtures come from `stackbind_cli::test_utils`: one parent stack
//! (`integrail`) with a MongoDB cluster and a bucket, a direct consumer
//! (`billing`) and a dependency consumer (`reports`).
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cross_stack**: provisioning runs through the library API
//! - **cli**: the `name`, `plan` and `render` commands
//! - **global_config**: configuration discovery and its effect on runs

mod cross_stack;
mod global_config;
