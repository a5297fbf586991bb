//! Stream reader: the producer thread between engine stdout and the queue.
//!
//! The loop reads exactly one block worth of bytes, decodes it and pushes it
//! (waiting while the queue is full). It ends at end-of-stream, when the stop
//! flag is set, or when the queue is closed under it. `stop()` relies on the
//! engine being terminated to turn a pending read into end-of-stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::bridge::BridgeEvent;
use crate::config::StreamConfig;
use crate::decoder::decode_block;
use crate::diagnostics::Diagnostics;
use crate::engine::{EngineOutput, read_chunk};
use crate::error::BridgeError;
use crate::queue::BlockQueue;

/// Why the reader loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The engine closed its output.
    EndOfStream,
    /// The stop flag was observed.
    Stopped,
    /// The queue was closed while a block was pending.
    QueueClosed,
    /// Reading or decoding failed.
    Failed(String),
}

/// Everything the reader thread owns or shares.
pub struct StreamReader {
    pub output: EngineOutput,
    pub queue: Arc<BlockQueue>,
    pub stream: StreamConfig,
    pub stop: Arc<AtomicBool>,
    pub end_of_audio: Arc<AtomicBool>,
    pub diagnostics: Arc<Diagnostics>,
    pub events: mpsc::Sender<BridgeEvent>,
}

impl StreamReader {
    /// Run the loop on a new `parla-reader` thread.
    pub fn spawn(self) -> Result<JoinHandle<ReaderExit>, BridgeError> {
        thread::Builder::new()
            .name("parla-reader".into())
            .spawn(move || self.run())
            .map_err(|e| BridgeError::ReaderSpawn(e.to_string()))
    }

    /// Run the loop on the current thread until it exits.
    pub fn run(mut self) -> ReaderExit {
        let exit = self.pump();

        self.end_of_audio.store(true, Ordering::SeqCst);
        match &exit {
            ReaderExit::Failed(reason) => {
                tracing::error!(%reason, "Stream reader failed");
                let _ = self.events.try_send(BridgeEvent::StreamError(reason.clone()));
            }
            other => tracing::debug!(exit = ?other, "Stream reader finished"),
        }
        let _ = self.events.try_send(BridgeEvent::EndOfAudio);

        exit
    }

    fn pump(&mut self) -> ReaderExit {
        let frame_bytes = self.stream.frame_bytes();
        let mut buf = vec![0u8; self.stream.block_bytes()];

        while !self.stop.load(Ordering::SeqCst) {
            let n = match read_chunk(&mut self.output, &mut buf) {
                Ok(n) => n,
                Err(e) => return ReaderExit::Failed(e.to_string()),
            };

            let end_of_stream = n < buf.len();
            let aligned = n - n % frame_bytes;
            if aligned < n {
                tracing::warn!(
                    trailing = n - aligned,
                    "Dropping partial frame at end of engine output"
                );
            }

            if aligned > 0 {
                let block = match decode_block(&buf[..aligned], self.stream.channels) {
                    Ok(block) => block,
                    Err(e) => return ReaderExit::Failed(e.to_string()),
                };
                if self.queue.push(block).is_err() {
                    return ReaderExit::QueueClosed;
                }
                self.diagnostics.record_block_queued();
            }

            if end_of_stream {
                return ReaderExit::EndOfStream;
            }
        }

        ReaderExit::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::encode_samples;
    use std::io::Cursor;

    fn reader_over(
        bytes: Vec<u8>,
        channels: u16,
        block_size: u32,
        capacity: usize,
    ) -> (StreamReader, Arc<BlockQueue>, mpsc::Receiver<BridgeEvent>) {
        let queue = Arc::new(BlockQueue::new(capacity));
        let (events, rx) = mpsc::channel(8);
        let reader = StreamReader {
            output: Box::new(Cursor::new(bytes)),
            queue: Arc::clone(&queue),
            stream: StreamConfig {
                sample_rate: 16_000,
                channels,
                block_size,
            },
            stop: Arc::new(AtomicBool::new(false)),
            end_of_audio: Arc::new(AtomicBool::new(false)),
            diagnostics: Arc::new(Diagnostics::new()),
            events,
        };
        (reader, queue, rx)
    }

    #[test]
    fn splits_stream_into_blocks_with_short_tail() {
        let samples: Vec<i16> = (1..=10).collect();
        let (reader, queue, mut rx) = reader_over(encode_samples(&samples), 1, 4, 8);
        let end_of_audio = Arc::clone(&reader.end_of_audio);

        assert_eq!(reader.run(), ReaderExit::EndOfStream);

        let blocks: Vec<Vec<i16>> = std::iter::from_fn(|| queue.try_pop())
            .map(|b| b.samples().to_vec())
            .collect();
        assert_eq!(blocks, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);
        assert!(end_of_audio.load(Ordering::SeqCst));
        assert_eq!(rx.try_recv().unwrap(), BridgeEvent::EndOfAudio);
    }

    #[test]
    fn drops_trailing_partial_frame() {
        // Two stereo frames plus one stray sample.
        let bytes = encode_samples(&[1, 2, 3, 4, 5]);
        let (reader, queue, _rx) = reader_over(bytes, 2, 4, 8);

        assert_eq!(reader.run(), ReaderExit::EndOfStream);
        assert_eq!(queue.try_pop().unwrap().samples(), &[1, 2, 3, 4]);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let (reader, queue, _rx) = reader_over(Vec::new(), 1, 4, 8);
        assert_eq!(reader.run(), ReaderExit::EndOfStream);
        assert!(queue.is_empty());
    }

    #[test]
    fn stop_flag_prevents_reading() {
        let (reader, queue, _rx) = reader_over(encode_samples(&[1; 64]), 1, 4, 8);
        reader.stop.store(true, Ordering::SeqCst);
        assert_eq!(reader.run(), ReaderExit::Stopped);
        assert!(queue.is_empty());
    }

    #[test]
    fn closed_queue_ends_reader() {
        let (reader, queue, _rx) = reader_over(encode_samples(&[1; 64]), 1, 4, 2);
        queue.close();
        assert_eq!(reader.run(), ReaderExit::QueueClosed);
    }
}
