//! CLI-specific error types and mappings.
//!
//! Maps [`BridgeError`] and [`ConfigError`] from the library onto exit codes
//! and user-facing messages.

use parla_voice::{BridgeError, ConfigError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument or input error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine process error.
    #[error("Engine error: {0}")]
    Process(String),

    /// Audio device error.
    #[error("Audio device error: {0}")]
    Device(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Device(_) => 69,   // EX_UNAVAILABLE
            Self::Process(_) => 71,  // EX_OSERR
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<BridgeError> for CliError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Config(config_err) => config_err.into(),
            BridgeError::EmptyText => Self::Arguments(err.to_string()),
            BridgeError::NoOutputDevice
            | BridgeError::OutputStreamError(_)
            | BridgeError::AudioThreadDied => Self::Device(err.to_string()),
            BridgeError::Io(io_err) => io_err.into(),
            BridgeError::EngineSpawn { .. }
            | BridgeError::EngineClosed
            | BridgeError::MalformedStream { .. }
            | BridgeError::QueueClosed
            | BridgeError::ReaderSpawn(_)
            | BridgeError::Render { .. } => Self::Process(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_exit_78() {
        let err: CliError = BridgeError::Config(ConfigError::InvalidChannels(0)).into();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_engine_errors_exit_71() {
        let err: CliError = BridgeError::Render {
            code: Some(1),
            stderr: "bad model".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 71);
        assert!(err.to_string().contains("bad model"));
    }

    #[test]
    fn test_device_errors_exit_69() {
        let err: CliError = BridgeError::NoOutputDevice.into();
        assert_eq!(err.exit_code(), 69);
    }

    #[test]
    fn test_empty_text_is_usage_error() {
        let err: CliError = BridgeError::EmptyText.into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_io_errors_exit_74() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CliError = BridgeError::Io(io).into();
        assert_eq!(err.exit_code(), 74);
    }
}
