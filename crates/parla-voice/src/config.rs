//! Bridge configuration: the JSON file schema, validation, and the derived
//! [`StreamConfig`] shared by the decoder, queue and playback callback.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of blocks the queue holds before the reader is paused.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default time the engine gets to exit after SIGTERM before it is killed.
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 500;

/// Longest accepted grace period; keeps `stop()` within a few seconds.
pub const MAX_TERMINATE_GRACE_MS: u64 = 1_500;

/// Bytes per sample on the wire (signed 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bridge configuration as stored in `tts_config.json`.
///
/// Engine and stream keys are upper-case (`PIPER_BIN`, `SAMPLE_RATE`, ...),
/// tuning keys are snake case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Path to the synthesis engine binary (e.g. `piper`).
    #[serde(rename = "PIPER_BIN")]
    pub engine_bin: PathBuf,

    /// Path to the voice model passed as `--model`.
    #[serde(rename = "MODEL_PATH")]
    pub model_path: PathBuf,

    /// Output sample rate in Hz. Must match the voice model.
    #[serde(rename = "SAMPLE_RATE")]
    pub sample_rate: u32,

    /// Interleaved channel count of the engine output.
    #[serde(rename = "CHANNELS")]
    pub channels: u16,

    /// Frames per audio-device period and per queued block.
    #[serde(rename = "BLOCK_SIZE")]
    pub block_size: u32,

    /// Extra arguments appended verbatim to the engine command line.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Informational only; the voice model decides the language.
    #[serde(rename = "DEFAULT_LANGUAGE", default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,

    /// Block queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Grace period between SIGTERM and SIGKILL, in milliseconds.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

const fn default_terminate_grace_ms() -> u64 {
    DEFAULT_TERMINATE_GRACE_MS
}

impl BridgeConfig {
    /// Create a configuration with default queue and shutdown tuning.
    pub fn new(
        engine_bin: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
        sample_rate: u32,
        channels: u16,
        block_size: u32,
    ) -> Self {
        Self {
            engine_bin: engine_bin.into(),
            model_path: model_path.into(),
            sample_rate,
            channels,
            block_size,
            extra_args: Vec::new(),
            default_language: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
        }
    }

    /// The stream parameters fixed for a session.
    #[must_use]
    pub const fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_size: self.block_size,
        }
    }

    /// Grace period before the engine is force-killed.
    #[must_use]
    pub const fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

/// Immutable stream parameters agreed on by every stage of a session.
///
/// The sample format is always signed 16-bit; it is not a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: u32,
}

impl StreamConfig {
    /// Bytes in one interleaved frame.
    #[must_use]
    pub const fn frame_bytes(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }

    /// Bytes the reader pulls from the engine per block.
    #[must_use]
    pub const fn block_bytes(&self) -> usize {
        self.block_size as usize * self.frame_bytes()
    }

    /// Duration of one block at the stream's sample rate.
    #[must_use]
    pub fn period(&self) -> Duration {
        let rate = u64::from(self.sample_rate.max(1));
        Duration::from_micros(u64::from(self.block_size) * 1_000_000 / rate)
    }

    /// Samples (not frames) in a full block.
    #[must_use]
    pub const fn block_samples(&self) -> usize {
        self.block_size as usize * self.channels as usize
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Engine binary path cannot be empty")]
    EmptyEngineBin,

    #[error("Model path cannot be empty")]
    EmptyModelPath,

    #[error("Sample rate must be between 8000 and 192000 Hz, got {0}")]
    InvalidSampleRate(u32),

    #[error("Channel count must be between 1 and 8, got {0}")]
    InvalidChannels(u16),

    #[error("Block size must be between 16 and 16384 frames, got {0}")]
    InvalidBlockSize(u32),

    #[error("Queue capacity must be between 1 and 1024 blocks, got {0}")]
    InvalidQueueCapacity(usize),

    #[error("Terminate grace period must be at most 1500 ms, got {0}")]
    InvalidGracePeriod(u64),
}

/// Validate configuration values.
pub fn validate_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.engine_bin.as_os_str().is_empty() {
        return Err(ConfigError::EmptyEngineBin);
    }

    if config.model_path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyModelPath);
    }

    if !(8_000..=192_000).contains(&config.sample_rate) {
        return Err(ConfigError::InvalidSampleRate(config.sample_rate));
    }

    if !(1..=8).contains(&config.channels) {
        return Err(ConfigError::InvalidChannels(config.channels));
    }

    if !(16..=16_384).contains(&config.block_size) {
        return Err(ConfigError::InvalidBlockSize(config.block_size));
    }

    if !(1..=1024).contains(&config.queue_capacity) {
        return Err(ConfigError::InvalidQueueCapacity(config.queue_capacity));
    }

    if config.terminate_grace_ms > MAX_TERMINATE_GRACE_MS {
        return Err(ConfigError::InvalidGracePeriod(config.terminate_grace_ms));
    }

    Ok(())
}

/// Read, parse and validate a JSON configuration file.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let config: BridgeConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    validate_config(&config)?;

    tracing::debug!(
        path = %path.display(),
        sample_rate = config.sample_rate,
        channels = config.channels,
        block_size = config.block_size,
        "Loaded bridge configuration"
    );

    Ok(config)
}
