//! Command handlers.

pub mod check_config;
pub mod devices;
pub mod render;
pub mod repl;
pub mod say;

use parla_voice::playback::CpalOutput;
use parla_voice::{BridgeConfig, BridgeEvent, EventReceiver, PiperSpawner, SpeechBridge};

/// Bridge over a Piper process and the default or named output device.
fn open_bridge(config: BridgeConfig, device: Option<&str>) -> (SpeechBridge, EventReceiver) {
    match device {
        Some(name) => SpeechBridge::new(
            config,
            Box::new(PiperSpawner),
            Box::new(CpalOutput::with_device(name)),
        ),
        None => SpeechBridge::piper(config),
    }
}

/// Surface pending bridge events in the log.
fn log_events(events: &mut EventReceiver) {
    while let Ok(event) = events.try_recv() {
        match event {
            BridgeEvent::TextDropped { text, reason } => {
                tracing::warn!(%text, %reason, "Text was not spoken");
            }
            BridgeEvent::StreamError(reason) => {
                tracing::error!(%reason, "Audio stream from engine failed");
            }
            BridgeEvent::EndOfAudio => tracing::debug!("Engine output ended"),
            BridgeEvent::StateChanged(state) => tracing::debug!(?state, "Bridge state changed"),
        }
    }
}
