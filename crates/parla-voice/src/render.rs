//! One-shot synthesis of a single text into a WAV file.
//!
//! Unlike the streaming bridge, this runs a fresh engine per call and lets
//! the engine write the file itself.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// `<bin> --model <model> --output_file <out_path> [extra_args...]`
#[must_use]
pub fn build_render_command(config: &BridgeConfig, out_path: &Path) -> Command {
    let mut cmd = Command::new(&config.engine_bin);
    cmd.arg("--model")
        .arg(&config.model_path)
        .arg("--output_file")
        .arg(out_path)
        .args(&config.extra_args);
    cmd
}

/// Synthesize `text` into `out_path`, creating parent directories.
///
/// Returns the path of the written file.
pub fn render_to_file(
    config: &BridgeConfig,
    text: &str,
    out_path: &Path,
) -> Result<PathBuf, BridgeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(BridgeError::EmptyText);
    }

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut child = build_render_command(config, out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BridgeError::EngineSpawn {
            bin: config.engine_bin.clone(),
            reason: e.to_string(),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        // An engine that exits early is reported through its status below.
        match stdin.write_all(text.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e.into()),
        }
    }

    let output = child.wait_with_output()?;
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

    if !output.status.success() {
        tracing::warn!(code = ?output.status.code(), %stderr, "Engine render failed");
        return Err(BridgeError::Render {
            code: output.status.code(),
            stderr,
        });
    }

    if !out_path.is_file() {
        return Err(BridgeError::Render {
            code: output.status.code(),
            stderr: format!("output file not found: {}", out_path.display()),
        });
    }

    tracing::info!(path = %out_path.display(), chars = text.len(), "Rendered speech to file");
    Ok(out_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bin: impl Into<PathBuf>) -> BridgeConfig {
        BridgeConfig::new(bin, "voice.onnx", 22_050, 1, 1024)
    }

    #[test]
    fn render_command_uses_output_file_flag() {
        let mut cfg = config("piper");
        cfg.extra_args = vec!["--length_scale".into(), "1.1".into()];
        let cmd = build_render_command(&cfg, Path::new("out/speech.wav"));

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--model",
                "voice.onnx",
                "--output_file",
                "out/speech.wav",
                "--length_scale",
                "1.1"
            ]
        );
    }

    #[test]
    fn empty_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_to_file(&config("piper"), "  \n", &dir.path().join("a.wav"));
        assert!(matches!(result, Err(BridgeError::EmptyText)));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_to_file(
            &config("/nonexistent/parla-piper"),
            "ciao",
            &dir.path().join("a.wav"),
        );
        assert!(matches!(result, Err(BridgeError::EngineSpawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn failing_engine_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_to_file(&config("false"), "ciao", &dir.path().join("a.wav"));
        match result {
            Err(BridgeError::Render { code, .. }) => assert_eq!(code, Some(1)),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn missing_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/dir/a.wav");
        let result = render_to_file(&config("true"), "ciao", &out);

        assert!(matches!(result, Err(BridgeError::Render { code: Some(0), .. })));
        // Parent directories are created before the engine runs.
        assert!(out.parent().unwrap().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn engine_writes_text_to_output_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-piper");
        // $4 is the path after --output_file.
        fs::write(&script, "#!/bin/sh\ncat > \"$4\"\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let out = dir.path().join("speech.wav");
        let written = render_to_file(&config(&script), "  ciao mondo \n", &out).unwrap();

        assert_eq!(written, out);
        assert_eq!(fs::read_to_string(&out).unwrap(), "ciao mondo");
    }
}
