//! Bridge error types.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors that can occur in the speech bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The synthesis engine binary is missing or could not be launched.
    #[error("Failed to spawn synthesis engine {bin}: {reason}")]
    EngineSpawn { bin: PathBuf, reason: String },

    /// The synthesis engine has exited; its input channel is gone.
    #[error("Synthesis engine has exited")]
    EngineClosed,

    /// A raw PCM buffer did not end on a frame boundary.
    #[error("Malformed PCM stream: {len} bytes is not a multiple of {frame_bytes}-byte frames")]
    MalformedStream { len: usize, frame_bytes: usize },

    /// The block queue was closed while a push was pending.
    #[error("Block queue is closed")]
    QueueClosed,

    /// No audio output device found.
    #[error("No audio output device found")]
    NoOutputDevice,

    /// Failed to open or start the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// The dedicated audio thread went away before answering.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    /// Failed to spawn the stream reader thread.
    #[error("Failed to spawn stream reader thread: {0}")]
    ReaderSpawn(String),

    /// Nothing to synthesize after trimming.
    #[error("Text is empty")]
    EmptyText,

    /// One-shot rendering to a file failed.
    #[error("Engine render failed (exit code {code:?}): {stderr}")]
    Render { code: Option<i32>, stderr: String },

    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error (engine pipes, output files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
