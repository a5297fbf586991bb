//! Render command handler.

use std::path::Path;

use anyhow::Result;

use parla_voice::{BridgeConfig, render_to_file};

use crate::error::CliError;

/// Synthesize `text` into `output` and print the written path.
pub fn execute(config: &BridgeConfig, text: &str, output: &Path) -> Result<()> {
    let written = render_to_file(config, text, output).map_err(CliError::from)?;
    println!("{}", written.display());
    Ok(())
}
