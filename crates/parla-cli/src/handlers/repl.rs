//! Repl command handler.
//!
//! Prompts for a line, speaks it, and prompts again without waiting for the
//! audio to finish. An empty line or end of input leaves the loop.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Result;

use parla_voice::{BridgeConfig, EventReceiver, SpeakOutcome, SpeechBridge};

use super::{log_events, open_bridge};
use crate::error::CliError;

pub const PROMPT: &str = "Text to read: ";

/// How long playback must stay quiet before the REPL exits.
const EXIT_IDLE: Duration = Duration::from_millis(500);
const EXIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Run the interactive loop on stdin/stdout.
pub fn execute(config: BridgeConfig, device: Option<&str>) -> Result<()> {
    let (mut bridge, mut events) = open_bridge(config, device);
    bridge.start().map_err(CliError::from)?;

    let spoken = run(
        &mut bridge,
        &mut events,
        io::stdin().lock(),
        io::stdout().lock(),
    )?;

    // Let the last utterance finish before tearing the engine down.
    bridge.finish_input();
    if spoken > 0 && !bridge.wait_for_drain(EXIT_IDLE, EXIT_TIMEOUT) {
        tracing::warn!("Timed out waiting for playback");
    }
    tracing::debug!(spoken, "Leaving REPL");

    bridge.stop().map_err(CliError::from)?;
    log_events(&mut events);
    Ok(())
}

/// Read lines from `input` until an empty line or EOF, speaking each one.
///
/// Returns how many lines were handed to the engine.
pub fn run<R: BufRead, W: Write>(
    bridge: &mut SpeechBridge,
    events: &mut EventReceiver,
    input: R,
    mut out: W,
) -> io::Result<usize> {
    let mut spoken = 0;
    let mut lines = input.lines();

    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next().transpose()? else {
            writeln!(out)?;
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            break;
        }

        let outcome = bridge.speak(text);
        log_events(events);
        match outcome {
            SpeakOutcome::Submitted => spoken += 1,
            SpeakOutcome::Empty => {}
            SpeakOutcome::NotRunning | SpeakOutcome::EngineClosed => {
                writeln!(out, "The voice engine is no longer running.")?;
                break;
            }
        }
    }

    Ok(spoken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parla_voice::testing::{FakeEngineMonitor, FakeSpawner, ManualOutput};

    fn running_bridge() -> (SpeechBridge, EventReceiver, FakeEngineMonitor) {
        let spawner = FakeSpawner::new(64);
        let monitor = spawner.monitor();
        let config = BridgeConfig::new("fake-piper", "fake.onnx", 16_000, 1, 64);
        let (mut bridge, events) =
            SpeechBridge::new(config, Box::new(spawner), Box::new(ManualOutput::new()));
        bridge.start().unwrap();
        (bridge, events, monitor)
    }

    #[test]
    fn test_empty_line_exits() {
        let (mut bridge, mut events, monitor) = running_bridge();
        let mut out = Vec::new();

        let spoken = run(&mut bridge, &mut events, "uno\n  due  \n\ntre\n".as_bytes(), &mut out)
            .unwrap();

        assert_eq!(spoken, 2);
        assert_eq!(monitor.lines(), vec!["uno".to_string(), "due".to_string()]);
        assert_eq!(String::from_utf8(out).unwrap().matches(PROMPT).count(), 3);
    }

    #[test]
    fn test_end_of_input_exits() {
        let (mut bridge, mut events, monitor) = running_bridge();
        let mut out = Vec::new();

        let spoken = run(&mut bridge, &mut events, "ciao".as_bytes(), &mut out).unwrap();

        assert_eq!(spoken, 1);
        assert_eq!(monitor.lines(), vec!["ciao".to_string()]);
    }

    #[test]
    fn test_stops_when_engine_exits() {
        let (mut bridge, mut events, monitor) = running_bridge();
        monitor.crash();
        let mut out = Vec::new();

        let spoken = run(&mut bridge, &mut events, "uno\ndue\n".as_bytes(), &mut out).unwrap();

        assert_eq!(spoken, 0);
        assert!(String::from_utf8(out).unwrap().contains("no longer running"));
    }
}
