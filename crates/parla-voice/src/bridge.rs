//! Speech bridge controller. Owns one synthesis session at a time.
//!
//! ```text
//!   Stopped → Starting → Running → Stopping → Stopped
//!      ▲          │                               │
//!      └──────────┴── (start failure) ────────────┘
//! ```
//!
//! A session is the engine process, the stream reader thread, the block
//! queue and the device stream. `start` builds all four, `stop` tears them
//! down in an order that never leaves a thread waiting on something nobody
//! will service: device stream first, then the queue, then the engine, then
//! the reader join.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{BridgeConfig, StreamConfig, validate_config};
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::engine::{EngineSpawner, SynthesisEngine};
use crate::error::BridgeError;
use crate::playback::{AudioOutput, OutputStreamHandle, PlaybackCallback};
use crate::queue::BlockQueue;
use crate::reader::{ReaderExit, StreamReader};

/// Upper bound on waiting for the reader thread during `stop`.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Events buffered for the receiver. Newer events are dropped while full.
pub const EVENT_CAPACITY: usize = 64;

// ── Session state machine ──────────────────────────────────────────

/// Lifecycle state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// No engine, no threads, no device stream.
    #[default]
    Stopped,

    /// `start` is building the session.
    Starting,

    /// Text can be spoken.
    Running,

    /// `stop` is tearing the session down.
    Stopping,
}

// ── Events emitted by the bridge ───────────────────────────────────

/// Diagnostics emitted by the bridge and its reader thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Session state changed.
    StateChanged(SessionState),

    /// Text was not delivered to the engine.
    TextDropped { text: String, reason: String },

    /// The reader thread has exited; no further blocks will be queued.
    EndOfAudio,

    /// The reader hit an I/O or decode failure.
    StreamError(String),
}

/// Receiving end of a bridge's event channel.
pub type EventReceiver = mpsc::Receiver<BridgeEvent>;

/// Result of [`SpeechBridge::speak`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// The line was written to the engine.
    Submitted,
    /// Nothing left after trimming whitespace.
    Empty,
    /// The bridge is not running; the text was ignored.
    NotRunning,
    /// The engine has exited; the text was dropped.
    EngineClosed,
}

// ── Active session ─────────────────────────────────────────────────

struct Session {
    stream: StreamConfig,
    engine: Box<dyn SynthesisEngine>,
    queue: Arc<BlockQueue>,
    stop_flag: Arc<AtomicBool>,
    end_of_audio: Arc<AtomicBool>,
    reader: Option<JoinHandle<ReaderExit>>,
    output: Option<Box<dyn OutputStreamHandle>>,
    grace: Duration,
}

impl Session {
    /// Tear the session down. Bounded by the engine grace period plus
    /// [`READER_JOIN_TIMEOUT`].
    ///
    /// Every step runs even if the engine fails to terminate; that failure
    /// is returned afterwards.
    fn shutdown(mut self) -> Result<(), BridgeError> {
        self.stop_flag.store(true, Ordering::SeqCst);

        // Device first: the callback must not run against a closing queue.
        if let Some(output) = self.output.take() {
            output.close();
        }

        self.queue.close();

        let terminated = self.engine.terminate();
        if let Err(e) = &terminated {
            tracing::warn!(error = %e, "Engine termination failed");
        }

        if let Some(reader) = self.reader.take() {
            join_with_timeout(reader, READER_JOIN_TIMEOUT);
        }

        let dropped = self.queue.drain();
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded unplayed blocks");
        }
        tracing::debug!(grace_ms = self.grace.as_millis(), "Session torn down");
        terminated
    }
}

fn join_with_timeout(handle: JoinHandle<ReaderExit>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::error!("Stream reader did not exit in time; detaching");
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
    match handle.join() {
        Ok(exit) => tracing::debug!(exit = ?exit, "Stream reader joined"),
        Err(_) => tracing::error!("Stream reader panicked"),
    }
}

/// Collapse text to a single engine line.
fn normalize_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Speech bridge ──────────────────────────────────────────────────

/// Public controller: `start`, `speak`, `stop`.
///
/// Emits [`BridgeEvent`]s on the channel returned by [`SpeechBridge::new`].
/// Dropping the bridge stops it.
pub struct SpeechBridge {
    config: BridgeConfig,
    spawner: Box<dyn EngineSpawner>,
    output: Box<dyn AudioOutput>,
    state: SessionState,
    session: Option<Session>,
    /// Counters of the current (or most recent) session.
    diagnostics: Arc<Diagnostics>,
    event_tx: mpsc::Sender<BridgeEvent>,
}

impl SpeechBridge {
    /// Create a stopped bridge.
    ///
    /// Returns the bridge and a receiver for [`BridgeEvent`]s. The channel
    /// holds [`EVENT_CAPACITY`] events; while it is full, new events are
    /// dropped rather than queued, so an unread receiver costs nothing.
    pub fn new(
        config: BridgeConfig,
        spawner: Box<dyn EngineSpawner>,
        output: Box<dyn AudioOutput>,
    ) -> (Self, EventReceiver) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let bridge = Self {
            config,
            spawner,
            output,
            state: SessionState::Stopped,
            session: None,
            diagnostics: Arc::new(Diagnostics::new()),
            event_tx,
        };
        (bridge, event_rx)
    }

    /// Bridge wired to a Piper subprocess and the default cpal device.
    #[cfg(feature = "cpal")]
    pub fn piper(config: BridgeConfig) -> (Self, EventReceiver) {
        Self::new(
            config,
            Box::new(crate::engine::PiperSpawner),
            Box::new(crate::playback::CpalOutput::new()),
        )
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Stream parameters of the running session.
    #[must_use]
    pub fn stream_config(&self) -> Option<StreamConfig> {
        self.session.as_ref().map(|s| s.stream)
    }

    /// Counters of the current, or most recently stopped, session.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Blocks waiting in the queue.
    #[must_use]
    pub fn queued_blocks(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.queue.len())
    }

    /// Whether the reader has seen the engine's output end.
    #[must_use]
    pub fn is_end_of_audio(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.end_of_audio.load(Ordering::SeqCst))
    }

    /// Engine process id of the running session.
    #[must_use]
    pub fn engine_pid(&self) -> Option<u32> {
        self.session.as_ref().and_then(|s| s.engine.pid())
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start a session. A no-op while one is already starting or running.
    ///
    /// On failure every partially created resource is released and the
    /// bridge is back in [`SessionState::Stopped`].
    pub fn start(&mut self) -> Result<(), BridgeError> {
        if matches!(self.state, SessionState::Starting | SessionState::Running) {
            tracing::debug!(state = ?self.state, "start() ignored, session already active");
            return Ok(());
        }

        validate_config(&self.config)?;

        tracing::info!(
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            block_size = self.config.block_size,
            "Starting speech bridge"
        );
        self.set_state(SessionState::Starting);

        match self.open_session() {
            Ok(session) => {
                self.session = Some(session);
                self.set_state(SessionState::Running);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech bridge failed to start");
                self.set_state(SessionState::Stopped);
                Err(e)
            }
        }
    }

    fn open_session(&mut self) -> Result<Session, BridgeError> {
        let stream = self.config.stream_config();
        let diagnostics = Arc::new(Diagnostics::new());
        self.diagnostics = Arc::clone(&diagnostics);

        let mut engine = self.spawner.spawn(&self.config)?;
        let Some(engine_output) = engine.take_output() else {
            let _ = engine.terminate();
            return Err(BridgeError::EngineSpawn {
                bin: self.config.engine_bin.clone(),
                reason: "engine has no output stream".into(),
            });
        };

        let mut session = Session {
            stream,
            engine,
            queue: Arc::new(BlockQueue::new(self.config.queue_capacity)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            end_of_audio: Arc::new(AtomicBool::new(false)),
            reader: None,
            output: None,
            grace: self.config.terminate_grace(),
        };

        let reader = StreamReader {
            output: engine_output,
            queue: Arc::clone(&session.queue),
            stream,
            stop: Arc::clone(&session.stop_flag),
            end_of_audio: Arc::clone(&session.end_of_audio),
            diagnostics: Arc::clone(&diagnostics),
            events: self.event_tx.clone(),
        };
        match reader.spawn() {
            Ok(handle) => session.reader = Some(handle),
            Err(e) => {
                let _ = session.shutdown();
                return Err(e);
            }
        }

        let callback = PlaybackCallback::new(Arc::clone(&session.queue), stream, diagnostics);
        match self.output.open(stream, callback) {
            Ok(handle) => session.output = Some(handle),
            Err(e) => {
                let _ = session.shutdown();
                return Err(e);
            }
        }

        Ok(session)
    }

    /// Send text to the engine. Only effective while running.
    ///
    /// Surrounding whitespace is trimmed and inner line breaks are folded
    /// into spaces so the text reaches the engine as exactly one line.
    pub fn speak(&mut self, text: &str) -> SpeakOutcome {
        if self.state != SessionState::Running {
            tracing::debug!(state = ?self.state, "speak() ignored, bridge not running");
            return SpeakOutcome::NotRunning;
        }
        let Some(session) = self.session.as_mut() else {
            return SpeakOutcome::NotRunning;
        };

        let line = normalize_line(text);
        if line.is_empty() {
            return SpeakOutcome::Empty;
        }

        match session.engine.write_text(&line) {
            Ok(()) => {
                self.diagnostics.record_text_submitted();
                tracing::debug!(chars = line.len(), "Text submitted to engine");
                SpeakOutcome::Submitted
            }
            Err(e) => {
                self.diagnostics.record_text_dropped();
                tracing::warn!(error = %e, "Dropping text, engine unavailable");
                self.emit(BridgeEvent::TextDropped {
                    text: line,
                    reason: e.to_string(),
                });
                SpeakOutcome::EngineClosed
            }
        }
    }

    /// Close the engine's input so it synthesizes what it has and exits.
    ///
    /// Its output then ends, which flushes the final partial block of the
    /// last utterance onto the queue and marks end-of-audio. Later `speak`
    /// calls return [`SpeakOutcome::EngineClosed`]. Call before
    /// [`wait_for_drain`](Self::wait_for_drain) when nothing more will be
    /// said; a no-op unless running.
    pub fn finish_input(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            tracing::debug!("Closing engine input");
            session.engine.finish_input();
        }
    }

    /// Stop the session. A no-op when already stopped.
    ///
    /// The bridge always ends up [`SessionState::Stopped`]; an error only
    /// reports that the engine could not be reaped cleanly. Takes at most
    /// the engine grace period plus two seconds for the reader join; the
    /// join normally finishes as soon as the engine is gone.
    ///
    /// Audio still queued is discarded. Use [`finish_input`](Self::finish_input)
    /// and [`wait_for_drain`](Self::wait_for_drain) first to play it out.
    pub fn stop(&mut self) -> Result<(), BridgeError> {
        let Some(session) = self.session.take() else {
            if self.state != SessionState::Stopped {
                self.set_state(SessionState::Stopped);
            }
            return Ok(());
        };

        tracing::info!("Stopping speech bridge");
        self.set_state(SessionState::Stopping);
        let result = session.shutdown();
        self.set_state(SessionState::Stopped);
        result
    }

    /// Wait until queued audio has been played out.
    ///
    /// Returns `true` once the session has played some audio and playback
    /// has then been idle (empty queue, no new frames) for `idle`, or once
    /// the engine output ended, the queue is empty and two device periods
    /// passed without new frames. Returns `false` on `timeout`.
    ///
    /// `idle` should cover the engine's latency between sentences.
    pub fn wait_for_drain(&self, idle: Duration, timeout: Duration) -> bool {
        let Some(session) = self.session.as_ref() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        // Long enough for the callback to play a block it already popped.
        let settle = 2 * session.stream.period();
        let mut last_frames = self.diagnostics.snapshot().frames_played;
        let mut quiet_since = Instant::now();

        while Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);

            let frames = self.diagnostics.snapshot().frames_played;
            let queue_empty = session.queue.is_empty();

            if frames != last_frames || !queue_empty {
                last_frames = frames;
                quiet_since = Instant::now();
                continue;
            }

            let quiet = quiet_since.elapsed();
            if session.end_of_audio.load(Ordering::SeqCst) && quiet >= settle {
                return true;
            }
            if frames > 0 && quiet >= idle {
                return true;
            }
        }
        false
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.emit(BridgeEvent::StateChanged(state));
    }

    fn emit(&self, event: BridgeEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            tracing::debug!(?event, "Event channel full, dropping event");
        }
    }
}

impl Drop for SpeechBridge {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "Speech bridge stop on drop failed");
        }
    }
}
