//! Configuration management for stackbind.
//!
//! Descriptors (`server.yaml`, `client.yaml`) describe what to bind; the global
//! configuration holds user-wide defaults that apply to every run:
//!
//! **Location:** `~/.stackbind/config.toml` (`%LOCALAPPDATA%\stackbind\config.toml`
//! on Windows), overridden by the `STACKBIND_CONFIG` environment variable or the
//! `--config` flag.
//!
//! ```toml
//! organization = "acme"
//! default_naming_version = 2
//! password_length = 24
//!
//! [max_name_lengths]
//! mongodb-atlas = 21
//! ```
//!
//! A missing file yields the defaults.

pub mod global;

pub use global::GlobalConfig;
