//! Lock-free session counters.
//!
//! The playback callback updates these from the real-time thread, so every
//! field is a relaxed atomic and recording never allocates or blocks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for one session.
#[derive(Debug, Default)]
pub struct Diagnostics {
    underruns: AtomicU64,
    blocks_queued: AtomicU64,
    blocks_played: AtomicU64,
    frames_played: AtomicU64,
    silence_frames: AtomicU64,
    texts_submitted: AtomicU64,
    texts_dropped: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    /// Callback periods that found the queue empty.
    pub underruns: u64,
    pub blocks_queued: u64,
    pub blocks_played: u64,
    /// Frames written from engine audio.
    pub frames_played: u64,
    /// Frames padded with silence.
    pub silence_frames: u64,
    pub texts_submitted: u64,
    pub texts_dropped: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_underrun(&self) {
        bump(&self.underruns, 1);
    }

    pub fn record_block_queued(&self) {
        bump(&self.blocks_queued, 1);
    }

    pub fn record_block_played(&self) {
        bump(&self.blocks_played, 1);
    }

    pub fn record_frames(&self, played: u64, silence: u64) {
        if played > 0 {
            bump(&self.frames_played, played);
        }
        if silence > 0 {
            bump(&self.silence_frames, silence);
        }
    }

    pub fn record_text_submitted(&self) {
        bump(&self.texts_submitted, 1);
    }

    pub fn record_text_dropped(&self) {
        bump(&self.texts_dropped, 1);
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            underruns: self.underruns.load(Ordering::Relaxed),
            blocks_queued: self.blocks_queued.load(Ordering::Relaxed),
            blocks_played: self.blocks_played.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            silence_frames: self.silence_frames.load(Ordering::Relaxed),
            texts_submitted: self.texts_submitted.load(Ordering::Relaxed),
            texts_dropped: self.texts_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_records() {
        let diag = Diagnostics::new();
        diag.record_underrun();
        diag.record_underrun();
        diag.record_block_played();
        diag.record_frames(256, 0);
        diag.record_frames(100, 156);
        diag.record_text_dropped();

        let snap = diag.snapshot();
        assert_eq!(snap.underruns, 2);
        assert_eq!(snap.blocks_played, 1);
        assert_eq!(snap.frames_played, 356);
        assert_eq!(snap.silence_frames, 156);
        assert_eq!(snap.texts_dropped, 1);
        assert_eq!(snap.texts_submitted, 0);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(DiagnosticsSnapshot::default()).unwrap();
        assert!(json.get("framesPlayed").is_some());
        assert!(json.get("textsDropped").is_some());
    }
}
