//! Core types shared by every binding component.
//!
//! - [`error`] - the fail-closed error taxonomy ([`BindError`]) and CLI error
//!   presentation ([`ErrorContext`], [`user_friendly_error`])
//! - [`output`] - asynchronously-resolved values ([`Output`]) and the
//!   single-assignment cell used to resolve them ([`promise`])

pub mod error;
pub mod output;

pub use error::{BindError, ErrorContext, user_friendly_error};
pub use output::{Output, Promise, promise};
