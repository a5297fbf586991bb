//! Device output via `cpal`, confined to a dedicated audio thread.
//!
//! `cpal::Stream` is `!Send` on some platforms (macOS CoreAudio, etc.).
//! Rather than `unsafe impl Send`, the stream is built, played and dropped on
//! a single OS thread; the controller holds a `Send` handle that talks to it
//! over a channel.

use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{AudioOutput, OutputStreamHandle, PlaybackCallback};
use crate::config::StreamConfig;
use crate::error::BridgeError;

/// Default-host cpal output, optionally matched by device name substring.
#[derive(Debug, Clone, Default)]
pub struct CpalOutput {
    device_name: Option<String>,
}

impl CpalOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer the first output device whose name contains `needle`
    /// (case-insensitive); falls back to the default device.
    #[must_use]
    pub fn with_device(needle: impl Into<String>) -> Self {
        Self {
            device_name: Some(needle.into()),
        }
    }

    /// Names of the available output devices.
    pub fn list_devices() -> Result<Vec<String>, BridgeError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| BridgeError::OutputStreamError(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl AudioOutput for CpalOutput {
    fn open(
        &self,
        stream: StreamConfig,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn OutputStreamHandle>, BridgeError> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), BridgeError>>();
        let device_name = self.device_name.clone();

        let thread = thread::Builder::new()
            .name("parla-audio".into())
            .spawn(move || {
                let built = build_stream(device_name.as_deref(), stream, callback);
                let device_stream = match built {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                if init_tx.send(Ok(())).is_err() {
                    // Caller dropped, nothing to do.
                    return;
                }

                // Park until close() or the handle is dropped.
                let _ = shutdown_rx.recv();

                if let Err(e) = device_stream.pause() {
                    tracing::debug!(error = %e, "Failed to pause output stream");
                }
                drop(device_stream);
                tracing::debug!("Audio thread shutting down");
            })
            .map_err(|e| {
                BridgeError::OutputStreamError(format!("failed to spawn audio thread: {e}"))
            })?;

        // Wait for the audio thread to finish initialisation.
        init_rx.recv().map_err(|_| BridgeError::AudioThreadDied)??;

        Ok(Box::new(CpalStreamHandle {
            shutdown_tx,
            thread: Some(thread),
        }))
    }
}

fn build_stream(
    device_name: Option<&str>,
    stream: StreamConfig,
    mut callback: PlaybackCallback,
) -> Result<cpal::Stream, BridgeError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(needle) => {
            let needle = needle.to_lowercase();
            host.output_devices()
                .map_err(|e| BridgeError::OutputStreamError(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n.to_lowercase().contains(&needle)))
                .or_else(|| host.default_output_device())
        }
        None => host.default_output_device(),
    }
    .ok_or(BridgeError::NoOutputDevice)?;

    let buffer_size = match device.supported_output_configs() {
        Ok(ranges) => pick_buffer_size(ranges, stream),
        Err(e) => {
            tracing::debug!(error = %e, "Could not query output configs");
            cpal::BufferSize::Default
        }
    };
    if matches!(buffer_size, cpal::BufferSize::Default) {
        tracing::warn!(
            block_size = stream.block_size,
            "Device does not support the block size, using its default period"
        );
    }

    let config = cpal::StreamConfig {
        channels: stream.channels,
        sample_rate: cpal::SampleRate(stream.sample_rate),
        buffer_size,
    };

    let err_fn = |err: cpal::StreamError| {
        tracing::error!(%err, "Audio output stream error");
    };

    let device_stream = device
        .build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                callback.fill(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| BridgeError::OutputStreamError(e.to_string()))?;

    device_stream
        .play()
        .map_err(|e| BridgeError::OutputStreamError(e.to_string()))?;

    tracing::info!(
        device = %device.name().unwrap_or_default(),
        sample_rate = stream.sample_rate,
        channels = stream.channels,
        block_size = stream.block_size,
        "Audio output started"
    );

    Ok(device_stream)
}

/// `Fixed(block_size)` when a range matching the stream's channels and rate
/// accepts it, else the device default. The callback tolerates any period.
fn pick_buffer_size(
    ranges: impl IntoIterator<Item = cpal::SupportedStreamConfigRange>,
    stream: StreamConfig,
) -> cpal::BufferSize {
    let rate = cpal::SampleRate(stream.sample_rate);
    let fits = ranges.into_iter().any(|range| {
        range.channels() == stream.channels
            && range.min_sample_rate() <= rate
            && rate <= range.max_sample_rate()
            && matches!(
                *range.buffer_size(),
                cpal::SupportedBufferSize::Range { min, max }
                    if (min..=max).contains(&stream.block_size)
            )
    });
    if fits {
        cpal::BufferSize::Fixed(stream.block_size)
    } else {
        cpal::BufferSize::Default
    }
}

/// `Send` proxy for the stream living on the audio thread.
struct CpalStreamHandle {
    shutdown_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputStreamHandle for CpalStreamHandle {
    fn close(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl CpalStreamHandle {
    fn shutdown(&mut self) {
        // Best-effort; the thread may already be dead.
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CpalStreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(channels: u16, min: u32, max: u32) -> cpal::SupportedStreamConfigRange {
        cpal::SupportedStreamConfigRange::new(
            channels,
            cpal::SampleRate(8_000),
            cpal::SampleRate(96_000),
            cpal::SupportedBufferSize::Range { min, max },
            cpal::SampleFormat::I16,
        )
    }

    fn stream() -> StreamConfig {
        StreamConfig {
            sample_rate: 22_050,
            channels: 1,
            block_size: 256,
        }
    }

    #[test]
    fn fixed_when_block_size_is_in_range() {
        let picked = pick_buffer_size(vec![range(2, 64, 4096), range(1, 64, 4096)], stream());
        assert_eq!(picked, cpal::BufferSize::Fixed(256));
    }

    #[test]
    fn default_when_block_size_is_out_of_range() {
        let picked = pick_buffer_size(vec![range(1, 512, 4096)], stream());
        assert_eq!(picked, cpal::BufferSize::Default);
    }

    #[test]
    fn default_when_channels_or_size_unknown() {
        let unknown = cpal::SupportedStreamConfigRange::new(
            1,
            cpal::SampleRate(8_000),
            cpal::SampleRate(96_000),
            cpal::SupportedBufferSize::Unknown,
            cpal::SampleFormat::I16,
        );
        assert_eq!(
            pick_buffer_size(vec![unknown, range(2, 64, 4096)], stream()),
            cpal::BufferSize::Default
        );
    }
}
