//! Real-time playback: the consumer end of the block queue.
//!
//! [`PlaybackCallback::fill`] runs on the host audio thread once per device
//! period. It only ever calls [`BlockQueue::try_pop`], writes into the buffer
//! it is handed, and bumps atomic counters: no locks, no I/O, no logging.
//!
//! A block longer than the period is not truncated. The unread tail stays in
//! the cursor and is played first on the next period.

mod output;

#[cfg(feature = "cpal")]
mod cpal_output;

use std::sync::Arc;

pub use output::{AudioOutput, OutputStreamHandle};

#[cfg(feature = "cpal")]
pub use cpal_output::CpalOutput;

use crate::config::StreamConfig;
use crate::decoder::SampleBlock;
use crate::diagnostics::Diagnostics;
use crate::queue::BlockQueue;

/// What one [`PlaybackCallback::fill`] call wrote, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillReport {
    /// Frames copied from engine audio.
    pub frames_written: usize,
    /// Frames padded with silence.
    pub silence_frames: usize,
}

impl FillReport {
    /// True when nothing at all was available.
    #[must_use]
    pub const fn is_underrun(&self) -> bool {
        self.frames_written == 0 && self.silence_frames > 0
    }
}

/// The block currently being played and how far into it we are.
struct Cursor {
    block: SampleBlock,
    offset: usize,
}

impl Cursor {
    fn remaining(&self) -> &[i16] {
        &self.block.samples()[self.offset..]
    }
}

/// Consumer state owned by the audio thread.
pub struct PlaybackCallback {
    queue: Arc<BlockQueue>,
    stream: StreamConfig,
    current: Option<Cursor>,
    diagnostics: Arc<Diagnostics>,
}

impl PlaybackCallback {
    pub fn new(queue: Arc<BlockQueue>, stream: StreamConfig, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            queue,
            stream,
            current: None,
            diagnostics,
        }
    }

    #[must_use]
    pub const fn stream_config(&self) -> StreamConfig {
        self.stream
    }

    /// Fill one device period of interleaved samples.
    ///
    /// `out.len()` is `frames_requested × channels`. Every sample of `out` is
    /// written: queued audio first, then silence.
    pub fn fill(&mut self, out: &mut [i16]) -> FillReport {
        let channels = usize::from(self.stream.channels.max(1));
        let mut written = 0;

        while written < out.len() {
            if self.current.is_none() {
                match self.queue.try_pop() {
                    Some(block) => {
                        self.diagnostics.record_block_played();
                        self.current = Some(Cursor { block, offset: 0 });
                    }
                    None => break,
                }
            }

            let Some(cursor) = self.current.as_mut() else {
                break;
            };

            let src = cursor.remaining();
            let n = src.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&src[..n]);
            written += n;
            cursor.offset += n;

            if cursor.remaining().is_empty() {
                self.current = None;
            }
        }

        out[written..].fill(0);

        let report = FillReport {
            frames_written: written / channels,
            silence_frames: (out.len() - written) / channels,
        };

        if report.is_underrun() {
            self.diagnostics.record_underrun();
        }
        self.diagnostics
            .record_frames(report.frames_written as u64, report.silence_frames as u64);

        report
    }

    /// Samples held back from a previous period.
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.current.as_ref().map_or(0, |c| c.remaining().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn setup(channels: u16, block_size: u32) -> (Arc<BlockQueue>, Arc<Diagnostics>, PlaybackCallback) {
        let queue = Arc::new(BlockQueue::new(8));
        let diagnostics = Arc::new(Diagnostics::new());
        let stream = StreamConfig {
            sample_rate: 22_050,
            channels,
            block_size,
        };
        let callback = PlaybackCallback::new(Arc::clone(&queue), stream, Arc::clone(&diagnostics));
        (queue, diagnostics, callback)
    }

    fn ramp(start: i16, frames: usize, channels: u16) -> SampleBlock {
        let samples = (0..frames)
            .flat_map(|f| {
                let v = start + i16::try_from(f).unwrap();
                std::iter::repeat_n(v, usize::from(channels))
            })
            .collect();
        SampleBlock::new(samples, channels).unwrap()
    }

    #[test]
    fn empty_queue_fills_silence_without_waiting() {
        let (_queue, diagnostics, mut callback) = setup(1, 64);
        let mut out = vec![7i16; 64];

        let started = Instant::now();
        let report = callback.fill(&mut out);

        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(out.iter().all(|&s| s == 0));
        assert!(report.is_underrun());
        assert_eq!(diagnostics.snapshot().underruns, 1);
    }

    #[test]
    fn short_block_is_padded_with_silence() {
        let (queue, diagnostics, mut callback) = setup(2, 8);
        queue.push(ramp(1, 3, 2)).unwrap();

        let mut out = vec![-1i16; 16];
        let report = callback.fill(&mut out);

        assert_eq!(&out[..6], &[1, 1, 2, 2, 3, 3]);
        assert!(out[6..].iter().all(|&s| s == 0));
        assert_eq!(report.frames_written, 3);
        assert_eq!(report.silence_frames, 5);
        assert!(!report.is_underrun());
        assert_eq!(diagnostics.snapshot().underruns, 0);
    }

    #[test]
    fn oversize_block_remainder_plays_next_period() {
        let (queue, _diagnostics, mut callback) = setup(1, 4);
        queue.push(ramp(10, 6, 1)).unwrap();

        let mut first = vec![0i16; 4];
        callback.fill(&mut first);
        assert_eq!(first, vec![10, 11, 12, 13]);
        assert_eq!(callback.pending_samples(), 2);

        let mut second = vec![0i16; 4];
        let report = callback.fill(&mut second);
        assert_eq!(second, vec![14, 15, 0, 0]);
        assert_eq!(report.frames_written, 2);
        assert_eq!(callback.pending_samples(), 0);
    }

    #[test]
    fn consecutive_blocks_fill_one_period() {
        let (queue, diagnostics, mut callback) = setup(1, 8);
        queue.push(ramp(1, 3, 1)).unwrap();
        queue.push(ramp(4, 3, 1)).unwrap();
        queue.push(ramp(7, 3, 1)).unwrap();

        let mut out = vec![0i16; 8];
        callback.fill(&mut out);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let mut next = vec![0i16; 8];
        callback.fill(&mut next);
        assert_eq!(next[0], 9);
        assert!(next[1..].iter().all(|&s| s == 0));
        assert_eq!(diagnostics.snapshot().blocks_played, 3);
    }

    #[test]
    fn frames_counted_across_periods() {
        let (queue, diagnostics, mut callback) = setup(2, 4);
        queue.push(ramp(1, 4, 2)).unwrap();

        let mut out = vec![0i16; 8];
        callback.fill(&mut out);
        callback.fill(&mut out);

        let snap = diagnostics.snapshot();
        assert_eq!(snap.frames_played, 4);
        assert_eq!(snap.silence_frames, 4);
        assert_eq!(snap.underruns, 1);
    }
}
