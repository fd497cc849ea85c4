//! Error handling for stackbind
//!
//! This module provides the error taxonomy of the binding engine and the
//! user-friendly error reporting used by the CLI. The error system follows two
//! principles:
//! 1. **Strongly-typed errors** for precise handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Configuration**: malformed or missing identity/role fields, caught before
//!   any provisioning call ([`BindError::Configuration`])
//! - **Naming**: empty identity inputs or impossible length limits
//!   ([`BindError::Naming`])
//! - **Resolution**: a required export is missing or empty
//!   ([`BindError::Resolution`])
//! - **Provisioning**: the credential backend rejected a grant
//!   ([`BindError::Provisioning`])
//! - **Cancellation**: the provisioning run was aborted ([`BindError::Cancelled`])
//!
//! Resource binding is fail-closed: every one of these errors aborts the run and
//! no partial compute context is ever returned.
//!
//! [`BindError`] is [`Clone`] because errors travel through shared futures
//! ([`crate::core::Output`]) that may be awaited by many continuations.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackbind_cli::core::{BindError, ErrorContext};
//!
//! let error = BindError::Resolution {
//!     reference: "integrail--prod".to_string(),
//!     export: "cluster-x-id".to_string(),
//!     suggestions: vec![],
//! };
//! let context = ErrorContext::new(error)
//!     .with_suggestion("Provision the parent stack before the compute stack");
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for binding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A required identity, role or descriptor field is missing or malformed.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem
        message: String,
    },

    /// An identifier could not be derived.
    #[error("Cannot derive name for resource '{resource}' of stack '{stack}': {reason}")]
    Naming {
        /// Owner stack given to the naming strategy
        stack: String,
        /// Resource name given to the naming strategy
        resource: String,
        /// Why the name could not be derived
        reason: String,
    },

    /// A required export is absent or empty in the referenced stack.
    ///
    /// Both the export key and the stack reference are carried so operators can
    /// tell which upstream stack and key are missing.
    #[error("Required export '{export}' not found in stack '{reference}'")]
    Resolution {
        /// Full reference string of the stack that was queried
        reference: String,
        /// Export key that was requested
        export: String,
        /// Similar export keys that do exist in the referenced stack
        suggestions: Vec<String>,
    },

    /// The referenced stack itself could not be opened.
    #[error("Cannot open stack '{reference}': {reason}")]
    StackUnavailable {
        /// Full reference string of the stack
        reference: String,
        /// Reason reported by the export source
        reason: String,
    },

    /// The credential backend failed to create or update a grant.
    #[error("Failed to provision credential for '{consumer}' on '{backing}': {reason}")]
    Provisioning {
        /// Consumer identity the grant was requested for
        consumer: String,
        /// Backing resource the grant targets
        backing: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// A descriptor file is syntactically or semantically invalid.
    #[error("Invalid descriptor {file}: {reason}")]
    DescriptorParse {
        /// Descriptor file name
        file: String,
        /// Parser or validation message
        reason: String,
    },

    /// A connection URI could not be parsed or rewritten.
    #[error("Invalid connection URI: {reason}")]
    InvalidUri {
        /// Parser message
        reason: String,
    },

    /// The provisioning run was cancelled before it converged.
    #[error("Provisioning run {run_id} was cancelled")]
    Cancelled {
        /// Identifier of the cancelled run
        run_id: String,
    },

    /// A value producer went away without resolving its output.
    #[error("Output '{name}' was dropped before it resolved")]
    Abandoned {
        /// Label of the abandoned output
        name: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl BindError {
    /// Shorthand for a [`BindError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: BindError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: BindError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Recognizes [`BindError`] (also when wrapped in `anyhow` context),
/// [`std::io::Error`] and YAML/TOML parse errors. Anything else is reported
/// with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(bind_error) = error.chain().find_map(|cause| cause.downcast_ref::<BindError>()) {
        return create_error_context(bind_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::NotFound {
            return ErrorContext::new(BindError::Other {
                message: format_chain(&error),
            })
            .with_suggestion("Check that the file exists and the path is correct");
        }
    }

    if error.chain().any(|cause| cause.is::<serde_yaml::Error>() || cause.is::<toml::de::Error>()) {
        return ErrorContext::new(BindError::Other {
            message: format_chain(&error),
        })
        .with_suggestion("Check the file syntax: indentation, quoting and key names")
        .with_details("Descriptors are YAML documents; the global configuration is TOML");
    }

    ErrorContext::new(BindError::Other {
        message: format_chain(&error),
    })
}

fn format_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn create_error_context(error: BindError) -> ErrorContext {
    match &error {
        BindError::Resolution {
            reference,
            export,
            suggestions,
        } => {
            let suggestion = if suggestions.is_empty() {
                format!(
                    "Make sure stack '{reference}' has been provisioned and exports '{export}'"
                )
            } else {
                format!("Did you mean: {}?", suggestions.join(", "))
            };
            ErrorContext::new(error.clone()).with_suggestion(suggestion).with_details(
                "A compute stack cannot start without its connection values, so missing required exports abort provisioning",
            )
        }
        BindError::StackUnavailable {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the exports snapshot or provision the parent stack first"),
        BindError::Naming {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Give every stack and resource a non-empty name and a length limit of at least 8"),
        BindError::Configuration {
            ..
        }
        | BindError::DescriptorParse {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix the descriptor and run the command again"),
        BindError::Provisioning {
            ..
        } => ErrorContext::new(error)
            .with_details("Credentials are issued per consumer; no other consumer's grant was modified"),
        BindError::Cancelled {
            ..
        } => ErrorContext::new(error)
            .with_details("Cancelled runs are never resumed; start a new run to converge"),
        BindError::InvalidUri {
            ..
        }
        | BindError::Abandoned {
            ..
        }
        | BindError::Other {
            ..
        } => ErrorContext::new(error),
    }
}
