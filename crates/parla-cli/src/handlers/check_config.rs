//! Check-config command handler.
//!
//! Loading already validates value ranges; this adds the checks that need
//! the filesystem and prints the result.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use parla_voice::BridgeConfig;

use crate::config;
use crate::error::CliError;

/// Load the configuration at `path` and print it with any warnings.
pub fn execute(path: &Path, json: bool) -> Result<()> {
    let config = config::load(path)?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&config).map_err(|e| CliError::Config(e.to_string()))?;
        println!("{rendered}");
    } else {
        print!("{}", summary(path, &config));
    }

    for warning in warnings(&config) {
        tracing::warn!("{warning}");
    }
    Ok(())
}

/// Human-readable `key = value` listing.
pub fn summary(path: &Path, config: &BridgeConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config        = {}", path.display());
    let _ = writeln!(out, "engine        = {}", config.engine_bin.display());
    let _ = writeln!(out, "model         = {}", config.model_path.display());
    let _ = writeln!(out, "sample_rate   = {} Hz", config.sample_rate);
    let _ = writeln!(out, "channels      = {}", config.channels);
    let _ = writeln!(out, "block_size    = {} frames", config.block_size);
    let _ = writeln!(out, "queue         = {} blocks", config.queue_capacity);
    let _ = writeln!(out, "grace         = {} ms", config.terminate_grace_ms);
    if let Some(language) = &config.default_language {
        let _ = writeln!(out, "language      = {language}");
    }
    if !config.extra_args.is_empty() {
        let _ = writeln!(out, "extra_args    = {}", config.extra_args.join(" "));
    }
    out
}

/// Problems that would make `start()` fail even though the values are valid.
pub fn warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.model_path.is_file() {
        warnings.push(format!("model file not found: {}", config.model_path.display()));
    }
    // Bare names are resolved through PATH at spawn time.
    if config.engine_bin.components().count() > 1 && !config.engine_bin.is_file() {
        warnings.push(format!("engine binary not found: {}", config.engine_bin.display()));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_values() {
        let mut config = BridgeConfig::new("piper", "it_IT-paola-medium.onnx", 22_050, 1, 1024);
        config.default_language = Some("it".into());
        let text = summary(Path::new("config/tts_config.json"), &config);

        assert!(text.contains("sample_rate   = 22050 Hz"));
        assert!(text.contains("language      = it"));
        assert!(!text.contains("extra_args"));
    }

    #[test]
    fn test_warnings_for_missing_files() {
        let config = BridgeConfig::new("/nonexistent/piper", "/nonexistent/voice.onnx", 22_050, 1, 1024);
        let warnings = warnings(&config);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_bare_engine_name_is_not_checked() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let config = BridgeConfig::new("piper", model.path(), 22_050, 1, 1024);
        assert!(warnings(&config).is_empty());
    }
}
