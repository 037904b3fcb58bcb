//! Soul Mastering CLI Library
//!
//! Command-line glue around the mastering pipeline: argument parsing, layered
//! configuration and the `export`, `play` and `info` subcommands.
//!
//! This library exposes the components for testing purposes.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use cli::{Cli, Command, SettingsArgs};
pub use config::CliConfig;
pub use error::{CliError, Result};
