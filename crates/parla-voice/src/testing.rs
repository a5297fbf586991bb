//! In-process engine and output doubles for driving a [`SpeechBridge`]
//! without Piper or an audio device.
//!
//! - [`FakeSpawner`] produces engines that answer every text line with a
//!   fixed number of frames, each sample set to the 1-based line number.
//! - [`ManualOutput`] holds the [`PlaybackCallback`] and lets the test pull
//!   periods with [`ManualOutput::pump`], standing in for the device clock.
//!
//! [`SpeechBridge`]: crate::bridge::SpeechBridge

use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::config::{BridgeConfig, StreamConfig};
use crate::decoder::encode_samples;
use crate::engine::{EngineOutput, EngineSpawner, SynthesisEngine};
use crate::error::BridgeError;
use crate::playback::{AudioOutput, OutputStreamHandle, PlaybackCallback};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ── Fake engine ────────────────────────────────────────────────────

#[derive(Default)]
struct MonitorState {
    spawn_count: usize,
    terminate_count: usize,
    lines: Vec<String>,
    /// Audio sink of the live engine; `None` once it has exited.
    sink: Option<Sender<Vec<u8>>>,
}

/// Shared view of the engines a [`FakeSpawner`] has launched.
#[derive(Clone, Default)]
pub struct FakeEngineMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl FakeEngineMonitor {
    pub fn spawn_count(&self) -> usize {
        lock(&self.state).spawn_count
    }

    pub fn terminate_count(&self) -> usize {
        lock(&self.state).terminate_count
    }

    /// Every line written to any engine, in order.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.state).lines.clone()
    }

    pub fn is_alive(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Make the live engine exit as if it had crashed.
    pub fn crash(&self) {
        lock(&self.state).sink = None;
    }
}

/// Spawns [`FakeEngine`]s.
#[derive(Clone)]
pub struct FakeSpawner {
    frames_per_line: usize,
    monitor: FakeEngineMonitor,
}

impl FakeSpawner {
    /// Each text line yields `frames_per_line` frames of audio.
    #[must_use]
    pub fn new(frames_per_line: usize) -> Self {
        Self {
            frames_per_line,
            monitor: FakeEngineMonitor::default(),
        }
    }

    #[must_use]
    pub fn monitor(&self) -> FakeEngineMonitor {
        self.monitor.clone()
    }
}

impl EngineSpawner for FakeSpawner {
    fn spawn(&self, config: &BridgeConfig) -> Result<Box<dyn SynthesisEngine>, BridgeError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        {
            let mut state = lock(&self.monitor.state);
            state.spawn_count += 1;
            state.sink = Some(tx);
        }
        Ok(Box::new(FakeEngine {
            frames_per_line: self.frames_per_line,
            channels: usize::from(config.channels),
            output: Some(FakeOutput {
                rx,
                pending: Vec::new(),
                pos: 0,
            }),
            monitor: self.monitor.clone(),
            terminated: false,
        }))
    }
}

/// Engine double that turns each line into a constant-valued PCM burst.
pub struct FakeEngine {
    frames_per_line: usize,
    channels: usize,
    output: Option<FakeOutput>,
    monitor: FakeEngineMonitor,
    terminated: bool,
}

impl SynthesisEngine for FakeEngine {
    fn write_text(&mut self, line: &str) -> Result<(), BridgeError> {
        let mut state = lock(&self.monitor.state);
        let Some(sink) = state.sink.clone() else {
            return Err(BridgeError::EngineClosed);
        };
        state.lines.push(line.to_owned());

        let value = i16::try_from(state.lines.len()).unwrap_or(i16::MAX);
        let samples = vec![value; self.frames_per_line * self.channels];
        sink.send(encode_samples(&samples))
            .map_err(|_| BridgeError::EngineClosed)
    }

    fn finish_input(&mut self) {
        // Audio already sent stays readable; the stream ends after it.
        lock(&self.monitor.state).sink = None;
    }

    fn take_output(&mut self) -> Option<EngineOutput> {
        self.output.take().map(|o| Box::new(o) as EngineOutput)
    }

    fn terminate(&mut self) -> Result<(), BridgeError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        let mut state = lock(&self.monitor.state);
        state.terminate_count += 1;
        state.sink = None;
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && self.monitor.is_alive()
    }
}

/// Blocking byte stream fed by a [`FakeEngine`]; ends when the engine exits.
pub struct FakeOutput {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for FakeOutput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ── Manual output ──────────────────────────────────────────────────

#[derive(Default)]
struct ManualState {
    callback: Option<PlaybackCallback>,
    opened: usize,
    fail: bool,
}

/// Output double whose periods are pulled by the test.
#[derive(Clone, Default)]
pub struct ManualOutput {
    state: Arc<Mutex<ManualState>>,
}

impl ManualOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose `open` always fails, like a missing device.
    #[must_use]
    pub fn failing() -> Self {
        let output = Self::default();
        lock(&output.state).fail = true;
        output
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).callback.is_some()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).opened
    }

    /// Run one period of `frames` frames. `None` when no stream is open.
    pub fn pump(&self, frames: usize) -> Option<Vec<i16>> {
        let mut state = lock(&self.state);
        let callback = state.callback.as_mut()?;
        let channels = usize::from(callback.stream_config().channels);
        let mut out = vec![0i16; frames * channels];
        callback.fill(&mut out);
        Some(out)
    }
}

impl AudioOutput for ManualOutput {
    fn open(
        &self,
        _stream: StreamConfig,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn OutputStreamHandle>, BridgeError> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(BridgeError::OutputStreamError("device unavailable".into()));
        }
        state.opened += 1;
        state.callback = Some(callback);
        Ok(Box::new(ManualHandle {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ManualHandle {
    state: Arc<Mutex<ManualState>>,
}

impl OutputStreamHandle for ManualHandle {
    fn close(self: Box<Self>) {
        lock(&self.state).callback = None;
    }
}

// ── Script engine ──────────────────────────────────────────────────

/// Spawns `sh -c <script>` as a real engine process.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct ScriptSpawner {
    script: String,
}

#[cfg(unix)]
impl ScriptSpawner {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[cfg(unix)]
impl EngineSpawner for ScriptSpawner {
    fn spawn(&self, config: &BridgeConfig) -> Result<Box<dyn SynthesisEngine>, BridgeError> {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(&self.script);
        let engine =
            crate::engine::PiperEngine::spawn(cmd, "sh".into(), config.terminate_grace())?;
        Ok(Box::new(engine))
    }
}
