//! A `BlockingQueue<u64>` that records its history for invariant checking.
//!
//! Every completed put and get is appended to a log while the queue lock is
//! held, so the log order matches the order items entered and left the
//! buffer. The log is read through `mq_core::QueueProperties`.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use mq_core::QueueProperties;

use crate::blocking::{BlockingQueue, Patience};
use crate::error::{CapacityError, GetError, PutError};

#[derive(Debug, Default)]
struct Tracker {
    accepted: Vec<u64>,
    delivered: Vec<u64>,
    peak: usize,
}

/// Recording wrapper around `BlockingQueue<u64>`.
#[derive(Debug)]
pub struct TrackedQueue {
    inner: BlockingQueue<u64>,
    tracker: Mutex<Tracker>,
}

impl TrackedQueue {
    /// # Errors
    ///
    /// Returns `CapacityError` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        Ok(Self {
            inner: BlockingQueue::new(capacity)?,
            tracker: Mutex::new(Tracker::default()),
        })
    }

    pub fn put(&self, item: u64) -> Result<(), PutError<u64>> {
        self.put_with(item, Patience::Block)
    }

    pub fn put_timeout(&self, item: u64, timeout: Duration) -> Result<(), PutError<u64>> {
        self.put_with(item, Patience::from_timeout(timeout))
    }

    pub fn try_put(&self, item: u64) -> Result<(), PutError<u64>> {
        self.put_with(item, Patience::Poll)
    }

    pub fn get(&self) -> Result<u64, GetError> {
        self.get_with(Patience::Block)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<u64, GetError> {
        self.get_with(Patience::from_timeout(timeout))
    }

    pub fn try_get(&self) -> Result<u64, GetError> {
        self.get_with(Patience::Poll)
    }

    pub fn close(&self) {
        self.inner.close();
    }

    /// The wrapped queue, for operations that need no recording.
    #[must_use]
    pub fn queue(&self) -> &BlockingQueue<u64> {
        &self.inner
    }

    fn put_with(&self, item: u64, patience: Patience) -> Result<(), PutError<u64>> {
        self.inner.put_with(item, patience, |&item, len| {
            let mut tracker = self.tracker();
            tracker.accepted.push(item);
            tracker.peak = tracker.peak.max(len);
        })
    }

    fn get_with(&self, patience: Patience) -> Result<u64, GetError> {
        self.inner
            .get_with(patience, |&item| self.tracker().delivered.push(item))
    }

    // Lock order is queue then tracker. Never call into `inner` while holding
    // this guard.
    fn tracker(&self) -> std::sync::MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueProperties for TrackedQueue {
    fn accepted_items(&self) -> Vec<u64> {
        self.tracker().accepted.clone()
    }

    fn delivered_items(&self) -> Vec<u64> {
        self.tracker().delivered.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.inner.snapshot()
    }

    fn capacity(&self) -> u64 {
        self.inner.capacity() as u64
    }

    fn peak_len(&self) -> u64 {
        self.tracker().peak as u64
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use mq_core::{tag_item, PropertyChecker, QueuePropertyChecker};

    #[test]
    fn test_records_history() {
        let queue = TrackedQueue::new(2).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        assert_eq!(queue.try_put(3), Err(PutError::Full(3)));
        assert_eq!(queue.get(), Ok(1));

        assert_eq!(queue.accepted_items(), vec![1, 2]);
        assert_eq!(queue.delivered_items(), vec![1]);
        assert_eq!(queue.current_contents(), vec![2]);
        assert_eq!(queue.peak_len(), 2);
        assert!(QueuePropertyChecker::new(&queue).all_hold());
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let queue = TrackedQueue::new(1).unwrap();
        assert_eq!(queue.try_get(), Err(GetError::Empty));
        assert_eq!(queue.get_timeout(Duration::ZERO), Err(GetError::TimedOut));
        queue.close();
        assert_eq!(queue.put(1), Err(PutError::Closed(1)));

        assert!(queue.accepted_items().is_empty());
        assert!(queue.delivered_items().is_empty());
        assert!(queue.queue().is_closed());
    }

    #[test]
    fn test_concurrent_lanes_hold_invariants() {
        let queue = TrackedQueue::new(3).unwrap();

        std::thread::scope(|s| {
            for lane in 1..=3 {
                let queue = &queue;
                s.spawn(move || {
                    for seq in 0..200 {
                        queue.put(tag_item(lane, seq)).unwrap();
                    }
                });
            }
            // Leave two items behind so the buffered tail is checked too.
            for _ in 0..2 {
                s.spawn(|| {
                    for _ in 0..299 {
                        queue.get().unwrap();
                    }
                });
            }
        });

        let checker = QueuePropertyChecker::new(&queue);
        for result in checker.check_all() {
            assert!(result.passed, "{}", result);
        }
        assert_eq!(queue.delivered_items().len(), 598);
        assert_eq!(queue.current_contents().len(), 2);
    }
}
