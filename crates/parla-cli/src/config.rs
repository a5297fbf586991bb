//! Configuration file resolution.

use std::path::{Path, PathBuf};

use parla_voice::{BridgeConfig, load_config};

use crate::error::CliError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PARLA_CONFIG";

/// Used when neither `--config` nor `PARLA_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/tts_config.json";

/// `--config` (or `PARLA_CONFIG`, which clap folds into it), else the default.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), Path::to_path_buf)
}

/// Load and validate the configuration at `path`.
pub fn load(path: &Path) -> Result<BridgeConfig, CliError> {
    tracing::debug!(path = %path.display(), "Loading configuration");
    Ok(load_config(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/etc/parla.json")));
        assert_eq!(path, PathBuf::from("/etc/parla.json"));
    }

    #[test]
    fn test_default_path() {
        assert_eq!(resolve_config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }
}
