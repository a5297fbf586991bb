//! Frame decoder: raw little-endian PCM16 bytes to interleaved sample blocks.

use crate::config::BYTES_PER_SAMPLE;
use crate::error::BridgeError;

/// An immutable run of interleaved `i16` frames.
///
/// Holds at most `block_size` frames. Produced by the stream reader, moved
/// through the block queue, consumed once by the playback callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    samples: Box<[i16]>,
    channels: u16,
}

impl SampleBlock {
    /// Build a block from interleaved samples.
    ///
    /// Returns `None` when `channels` is zero or the samples do not form
    /// whole frames.
    pub fn new(samples: Vec<i16>, channels: u16) -> Option<Self> {
        if channels == 0 || samples.len() % usize::from(channels) != 0 {
            return None;
        }
        Some(Self {
            samples: samples.into_boxed_slice(),
            channels,
        })
    }

    /// Interleaved samples.
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Channel count the samples are interleaved with.
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when every sample is zero.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }
}

/// Decode raw PCM bytes into a [`SampleBlock`].
///
/// The buffer must end on a frame boundary; the stream reader slices its
/// reads so that it always does. A misaligned buffer is a reader bug.
pub fn decode_block(bytes: &[u8], channels: u16) -> Result<SampleBlock, BridgeError> {
    let frame_bytes = BYTES_PER_SAMPLE * usize::from(channels);
    if frame_bytes == 0 || bytes.len() % frame_bytes != 0 {
        return Err(BridgeError::MalformedStream {
            len: bytes.len(),
            frame_bytes,
        });
    }

    let samples: Vec<i16> = bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(SampleBlock {
        samples: samples.into_boxed_slice(),
        channels,
    })
}

/// Encode interleaved samples as little-endian PCM16 bytes.
///
/// The inverse of [`decode_block`]; used by the in-process test engine.
#[must_use]
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
