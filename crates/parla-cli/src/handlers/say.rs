//! Say command handler.

use std::time::Duration;

use anyhow::Result;

use parla_voice::{BridgeConfig, SpeakOutcome};

use super::{log_events, open_bridge};
use crate::error::CliError;

/// Speak `text` once and return when playback has finished.
pub fn execute(
    config: BridgeConfig,
    text: &str,
    device: Option<&str>,
    idle: Duration,
    timeout: Duration,
) -> Result<()> {
    let (mut bridge, mut events) = open_bridge(config, device);
    bridge.start().map_err(CliError::from)?;

    let outcome = bridge.speak(text);
    log_events(&mut events);
    match outcome {
        SpeakOutcome::Submitted => {}
        SpeakOutcome::Empty => return Err(CliError::Arguments("nothing to say".into()).into()),
        SpeakOutcome::NotRunning | SpeakOutcome::EngineClosed => {
            return Err(CliError::Process("engine exited before accepting text".into()).into());
        }
    }

    // Let the engine flush its last partial block.
    bridge.finish_input();
    if !bridge.wait_for_drain(idle, timeout) {
        tracing::warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for playback");
    }

    let diagnostics = bridge.diagnostics();
    tracing::debug!(
        underruns = diagnostics.underruns,
        blocks_played = diagnostics.blocks_played,
        frames_played = diagnostics.frames_played,
        "Playback finished"
    );

    bridge.stop().map_err(CliError::from)?;
    log_events(&mut events);
    Ok(())
}
