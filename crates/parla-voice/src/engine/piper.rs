//! Persistent Piper subprocess streaming raw PCM on stdout.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use super::shutdown::terminate_child;
use super::{EngineOutput, EngineSpawner, SynthesisEngine};
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Build the engine command line for persistent raw streaming.
///
/// `<bin> --model <model> --output-raw --output-file - [extra_args...]`
#[must_use]
pub fn build_command(config: &BridgeConfig) -> Command {
    let mut cmd = Command::new(&config.engine_bin);
    cmd.arg("--model")
        .arg(&config.model_path)
        .arg("--output-raw")
        .arg("--output-file")
        .arg("-")
        .args(&config.extra_args);
    cmd
}

/// Spawns [`PiperEngine`]s from a [`BridgeConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PiperSpawner;

impl EngineSpawner for PiperSpawner {
    fn spawn(&self, config: &BridgeConfig) -> Result<Box<dyn SynthesisEngine>, BridgeError> {
        if !config.model_path.exists() {
            return Err(BridgeError::EngineSpawn {
                bin: config.engine_bin.clone(),
                reason: format!("model file not found: {}", config.model_path.display()),
            });
        }

        let engine = PiperEngine::spawn(
            build_command(config),
            config.engine_bin.clone(),
            config.terminate_grace(),
        )?;
        Ok(Box::new(engine))
    }
}

/// A running engine process with piped stdin/stdout.
pub struct PiperEngine {
    /// `None` once terminated.
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    pid: u32,
    grace: Duration,
}

impl PiperEngine {
    /// Spawn `cmd` with piped stdin/stdout and discarded stderr.
    ///
    /// `bin` is only used for error reporting.
    pub fn spawn(mut cmd: Command, bin: PathBuf, grace: Duration) -> Result<Self, BridgeError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| BridgeError::EngineSpawn {
            bin: bin.clone(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let pid = child.id();

        tracing::info!(pid, bin = %bin.display(), "Synthesis engine started");

        Ok(Self {
            child: Some(child),
            stdin,
            stdout,
            pid,
            grace,
        })
    }
}

impl SynthesisEngine for PiperEngine {
    fn write_text(&mut self, line: &str) -> Result<(), BridgeError> {
        if !self.is_alive() {
            return Err(BridgeError::EngineClosed);
        }
        let stdin = self.stdin.as_mut().ok_or(BridgeError::EngineClosed)?;

        let mut payload = String::with_capacity(line.len() + 1);
        payload.push_str(line);
        payload.push('\n');

        stdin
            .write_all(payload.as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => BridgeError::EngineClosed,
                _ => BridgeError::Io(e),
            })
    }

    fn finish_input(&mut self) {
        self.stdin = None;
    }

    fn take_output(&mut self) -> Option<EngineOutput> {
        self.stdout.take().map(|out| Box::new(out) as EngineOutput)
    }

    fn terminate(&mut self) -> Result<(), BridgeError> {
        // Closing stdin lets Piper finish on its own before any signal.
        self.stdin = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = terminate_child(&mut child, self.grace)?;
        self.stdout = None;
        tracing::info!(pid = self.pid, %status, "Synthesis engine terminated");
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }
}

impl Drop for PiperEngine {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.terminate() {
                tracing::warn!(pid = self.pid, error = %e, "Failed to terminate engine on drop");
            }
        }
    }
}
