//! Streaming bridge from a persistent Piper TTS process to a real-time
//! audio device.
//!
//! ```text
//! speak(text) ─▶ engine stdin ─▶ engine stdout ─▶ parla-reader ─▶ BlockQueue ─▶ playback callback ─▶ device
//! ```
//!
//! The engine is spawned once per session and reused for every utterance.
//! The reader thread cuts its raw PCM output into blocks and pushes them
//! onto a bounded queue; the device callback pops whatever is ready and
//! pads the rest of each period with silence, so it never blocks.
//!
//! Start with [`SpeechBridge`]. Enable the `cpal` feature for a real output
//! device ([`playback::CpalOutput`]).
#![deny(unused_crate_dependencies)]

pub mod bridge;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod playback;
pub mod queue;
pub mod reader;
pub mod render;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export key types for convenience
pub use bridge::{BridgeEvent, EventReceiver, SessionState, SpeakOutcome, SpeechBridge};
pub use config::{BridgeConfig, ConfigError, StreamConfig, load_config, validate_config};
pub use diagnostics::DiagnosticsSnapshot;
pub use engine::{EngineSpawner, PiperSpawner, SynthesisEngine};
pub use error::BridgeError;
pub use render::render_to_file;
