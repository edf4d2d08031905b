//! Unbounded FIFO between the capture callback and its consumer

use super::block::AudioBlock;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Shared {
    blocks: Mutex<VecDeque<AudioBlock>>,
    available: Condvar,
}

/// Cloneable handle to a shared block queue
///
/// One clone lives in the capture callback (producer), another with the
/// recorder or live display (consumer). The queue never drops data and never
/// makes the producer wait for capacity.
#[derive(Clone, Default)]
pub struct BlockQueue {
    shared: Arc<Shared>,
}

impl BlockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AudioBlock>> {
        // A panicking consumer must not wedge the audio thread
        self.shared
            .blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a block to the tail and wake any waiting consumer.
    pub fn enqueue(&self, block: AudioBlock) {
        self.lock().push_back(block);
        self.shared.available.notify_all();
    }

    /// Remove the head block, or `None` when the queue is empty.
    pub fn try_dequeue(&self) -> Option<AudioBlock> {
        self.lock().pop_front()
    }

    /// Take every block currently queued, oldest first.
    pub fn drain(&self) -> Vec<AudioBlock> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Block until at least `count` blocks are queued or `timeout` elapses.
    ///
    /// Returns whether the threshold was reached.
    pub fn wait_for_len(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut blocks = self.lock();

        while blocks.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            blocks = self
                .shared
                .available
                .wait_timeout(blocks, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn block(tag: i16) -> AudioBlock {
        AudioBlock::new(vec![tag, tag], 2)
    }

    #[test]
    fn test_empty_queue_returns_none() {
        let queue = BlockQueue::new();
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_full_drain_is_fifo() {
        let queue = BlockQueue::new();
        for tag in 0..50 {
            queue.enqueue(block(tag));
        }
        assert_eq!(queue.len(), 50);

        let mut drained = Vec::new();
        while let Some(b) = queue.try_dequeue() {
            drained.push(b.samples()[0]);
        }
        assert_eq!(drained, (0..50).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_takes_everything_in_order() {
        let queue = BlockQueue::new();
        queue.enqueue(block(7));
        queue.enqueue(block(8));
        let tags: Vec<i16> = queue.drain().iter().map(|b| b.samples()[0]).collect();
        assert_eq!(tags, vec![7, 8]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_wait_for_len_times_out() {
        let queue = BlockQueue::new();
        queue.enqueue(block(1));
        let start = Instant::now();
        assert!(!queue.wait_for_len(2, Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(queue.wait_for_len(1, Duration::ZERO));
    }

    #[test]
    fn test_wait_for_len_wakes_on_enqueue() {
        let queue = BlockQueue::new();
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            for tag in 0..3 {
                thread::sleep(Duration::from_millis(5));
                producer.enqueue(block(tag));
            }
        });

        assert!(queue.wait_for_len(3, Duration::from_secs(10)));
        handle.join().unwrap();
        assert_eq!(queue.len(), 3);
    }
}
