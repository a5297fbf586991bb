//! Devices command handler.

use anyhow::Result;

use parla_voice::playback::CpalOutput;

use crate::error::CliError;

/// Print the names of the available output devices, one per line.
pub fn execute() -> Result<()> {
    let devices = CpalOutput::list_devices().map_err(CliError::from)?;
    if devices.is_empty() {
        println!("No audio output devices found");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}
