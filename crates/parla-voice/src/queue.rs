//! Bounded block queue between the stream reader and the playback callback.
//!
//! The producer side blocks while the queue is full (backpressure; blocks are
//! never dropped). The consumer side is `try_pop` only, so the real-time
//! callback can never be suspended by a slow producer. `close` wakes a
//! producer parked on a full queue and makes further pushes fail.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::decoder::SampleBlock;
use crate::error::BridgeError;

/// Bounded FIFO of [`SampleBlock`]s.
pub struct BlockQueue {
    tx: Sender<SampleBlock>,
    rx: Receiver<SampleBlock>,
    /// Dropped on `close`; disconnection wakes every `push` parked in `select!`.
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    closed: AtomicBool,
    capacity: usize,
}

impl BlockQueue {
    /// Create a queue holding at most `capacity` blocks (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        let (close_tx, close_rx) = bounded(0);
        Self {
            tx,
            rx,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueue a block, waiting while the queue is full.
    ///
    /// Fails with [`BridgeError::QueueClosed`] once [`close`](Self::close)
    /// has been called, including when the close happens mid-wait.
    pub fn push(&self, block: SampleBlock) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::QueueClosed);
        }

        select! {
            send(self.tx, block) -> res => res.map_err(|_| BridgeError::QueueClosed),
            recv(self.close_rx) -> _ => Err(BridgeError::QueueClosed),
        }
    }

    /// Dequeue the oldest block without waiting.
    pub fn try_pop(&self) -> Option<SampleBlock> {
        self.rx.try_recv().ok()
    }

    /// Close the queue. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.close_tx.lock() {
            guard.take();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Discard every queued block, returning how many were dropped.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn block(value: i16) -> SampleBlock {
        SampleBlock::new(vec![value; 4], 1).unwrap()
    }

    #[test]
    fn pops_in_push_order() {
        let queue = BlockQueue::new(8);
        for v in 1..=5 {
            queue.push(block(v)).unwrap();
        }
        let popped: Vec<i16> = std::iter::from_fn(|| queue.try_pop())
            .map(|b| b.samples()[0])
            .collect();
        assert_eq!(popped, vec![1, 2, 3, 4, 5]);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn try_pop_on_empty_returns_none() {
        let queue = BlockQueue::new(2);
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(BlockQueue::new(0).capacity(), 1);
    }

    #[test]
    fn push_waits_for_space() {
        let queue = Arc::new(BlockQueue::new(1));
        queue.push(block(1)).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(block(2)))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1, "second push must still be parked");

        assert_eq!(queue.try_pop().unwrap().samples()[0], 1);
        producer.join().unwrap().unwrap();
        assert_eq!(queue.try_pop().unwrap().samples()[0], 2);
    }

    #[test]
    fn close_wakes_blocked_producer() {
        let queue = Arc::new(BlockQueue::new(1));
        queue.push(block(1)).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let started = Instant::now();
                (queue.push(block(2)), started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        let (result, waited) = producer.join().unwrap();
        assert!(matches!(result, Err(BridgeError::QueueClosed)));
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn push_after_close_fails() {
        let queue = BlockQueue::new(4);
        queue.close();
        queue.close();
        assert!(queue.is_closed());
        assert!(matches!(queue.push(block(1)), Err(BridgeError::QueueClosed)));
    }

    #[test]
    fn drain_empties_queue() {
        let queue = BlockQueue::new(4);
        queue.push(block(1)).unwrap();
        queue.push(block(2)).unwrap();
        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }
}
