//! `parla` command-line front end.
//!
//! Thin adapter over `parla-voice`: parses arguments, resolves and loads the
//! bridge configuration, and maps library errors to exit codes.
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;

// Re-export primary types for convenient access
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
