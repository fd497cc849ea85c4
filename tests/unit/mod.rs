//! Unit test suite for stackbind
//!
//! Fast tests of the public library API, one module per concern. They need no
//! files or network and run in CI on every commit.
//!
//! ```bash
//! cargo test --test unit
//! ```
//!
//! - **naming**: identifier derivation and its length and collision guarantees
//! - **credentials**: consumer identities, role policy and grant issuance
//! - **stack_resolution**: stack references and export lookups
//! - **compute_context**: env accumulation, connection URIs and template tokens

mod compute_context;
mod credentials;
mod naming;
mod stack_resolution;
