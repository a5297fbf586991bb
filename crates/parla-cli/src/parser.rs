//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;
use crate::config::{CONFIG_ENV, resolve_config_path};

/// Command-line interface for the parla speech bridge.
#[derive(Parser)]
#[command(name = "parla")]
#[command(about = "Speak text through a persistent Piper voice")]
#[command(version)]
pub struct Cli {
    /// Path to the bridge configuration file
    #[arg(short = 'c', long = "config", global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Configuration file to load for this invocation.
    pub fn config_path(&self) -> PathBuf {
        resolve_config_path(self.config.as_deref())
    }
}
