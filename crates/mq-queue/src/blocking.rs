//! Bounded blocking queue.
//!
//! A monitor: one mutex guards the circular buffer and the closed flag, and
//! two condition variables carry the two wait predicates.
//!
//! | Condition | Waited on by | Signalled by |
//! |-----------|--------------|--------------|
//! | `not_full` | `put` while the buffer is full | `get` after removing an item |
//! | `not_empty` | `get` while the buffer is empty | `put` after adding an item |
//!
//! Every waiter re-checks its predicate in a loop after waking, so spurious
//! wakeups and barging threads are harmless. Because each condition only
//! ever has one kind of waiter, `notify_one` can never wake a thread that
//! cannot use the state change, and no wakeup is lost.
//!
//! `close` is the one broadcast: it wakes every waiter on both conditions so
//! they can observe the flag.

use std::fmt;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{CapacityError, GetError, PutError};
use crate::ring::CircularBuffer;
use crate::sync::{Condvar, Mutex, MutexGuard};

struct State<T> {
    ring: CircularBuffer<T>,
    closed: bool,
}

/// How long an operation is willing to wait for its predicate.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Patience {
    /// Wait as long as it takes.
    Block,
    /// Wait until the instant, then give up.
    Until(Instant),
    /// Do not wait at all.
    Poll,
}

impl Patience {
    pub(crate) fn from_timeout(timeout: Duration) -> Self {
        // Overflowing deadlines are as good as no deadline.
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Patience::Until(deadline),
            None => Patience::Block,
        }
    }
}

/// Outcome of waiting once on a condition.
enum Wait<'a, T> {
    Woken(MutexGuard<'a, State<T>>),
    Refused,
    Expired,
}

/// A FIFO queue of fixed capacity shared between producer and consumer
/// threads.
///
/// Share it by reference (`std::thread::scope`) or behind an `Arc`.
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Create an empty, open queue holding at most `capacity` items.
    ///
    /// # Errors
    ///
    /// Returns `CapacityError` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        let ring = CircularBuffer::new(capacity)?;
        debug!(capacity, "blocking queue created");

        Ok(Self {
            state: Mutex::new(State {
                ring,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    /// Insert `item` at the tail, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// `PutError::Closed` if the queue is closed before a slot frees up.
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.put_with(item, Patience::Block, |_, _| {})
    }

    /// Like `put`, but gives up once `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// `PutError::TimedOut` if no slot freed up in time, `PutError::Closed`
    /// if the queue was closed.
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.put_with(item, Patience::from_timeout(timeout), |_, _| {})
    }

    /// Insert `item` only if a slot is free right now.
    ///
    /// # Errors
    ///
    /// `PutError::Full` if the queue is full, `PutError::Closed` if it is
    /// closed.
    pub fn try_put(&self, item: T) -> Result<(), PutError<T>> {
        self.put_with(item, Patience::Poll, |_, _| {})
    }

    /// Remove the item at the head, waiting while the queue is empty.
    ///
    /// After `close`, remaining items are still returned in order.
    ///
    /// # Errors
    ///
    /// `GetError::Closed` once the queue is closed and drained.
    pub fn get(&self) -> Result<T, GetError> {
        self.get_with(Patience::Block, |_| {})
    }

    /// Like `get`, but gives up once `timeout` has elapsed.
    ///
    /// # Errors
    ///
    /// `GetError::TimedOut` if nothing arrived in time, `GetError::Closed`
    /// once the queue is closed and drained.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, GetError> {
        self.get_with(Patience::from_timeout(timeout), |_| {})
    }

    /// Remove the head item only if one is buffered right now.
    ///
    /// # Errors
    ///
    /// `GetError::Empty` if nothing is buffered, `GetError::Closed` once the
    /// queue is closed and drained.
    pub fn try_get(&self) -> Result<T, GetError> {
        self.get_with(Patience::Poll, |_| {})
    }

    /// Close the queue and wake every waiting thread.
    ///
    /// Pending and future `put`s fail with `PutError::Closed`. `get` keeps
    /// returning buffered items until the queue is drained. Closing twice is
    /// a no-op.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let remaining = state.ring.len();
        drop(state);

        debug!(remaining, "blocking queue closed");
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered items. Stale as soon as it returns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock().ring.is_full()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the buffered items, head first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().ring.iter().cloned().collect()
    }

    /// Shared body of every `put` flavour.
    ///
    /// `observe` runs under the lock as the item is placed, with the new
    /// length, so observers see puts in buffer order.
    pub(crate) fn put_with(
        &self,
        item: T,
        patience: Patience,
        observe: impl FnOnce(&T, usize),
    ) -> Result<(), PutError<T>> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(PutError::Closed(item));
            }
            if !state.ring.is_full() {
                break;
            }

            state = match self.wait(&self.not_full, state, patience) {
                Wait::Woken(guard) => guard,
                Wait::Refused => return Err(PutError::Full(item)),
                Wait::Expired => {
                    trace!(capacity = self.capacity, "put timed out");
                    return Err(PutError::TimedOut(item));
                }
            };
        }

        let len = state.ring.len() + 1;
        debug_assert!(len <= self.capacity);
        observe(&item, len);
        state.ring.push_back(item);
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Shared body of every `get` flavour. `observe` runs under the lock.
    pub(crate) fn get_with(
        &self,
        patience: Patience,
        observe: impl FnOnce(&T),
    ) -> Result<T, GetError> {
        let mut state = self.lock();

        // Buffered items win over the closed flag so close drains.
        loop {
            if !state.ring.is_empty() {
                break;
            }
            if state.closed {
                return Err(GetError::Closed);
            }

            state = match self.wait(&self.not_empty, state, patience) {
                Wait::Woken(guard) => guard,
                Wait::Refused => return Err(GetError::Empty),
                Wait::Expired => {
                    trace!("get timed out");
                    return Err(GetError::TimedOut);
                }
            };
        }

        let item = state.ring.pop_front();
        observe(&item);
        drop(state);

        self.not_full.notify_one();
        Ok(item)
    }

    /// Release the lock, sleep on `condvar`, and reacquire.
    ///
    /// Callers re-check their predicate on `Woken` before the deadline, so a
    /// signal that lands as the timer fires is still consumed.
    fn wait<'a>(
        &self,
        condvar: &Condvar,
        state: MutexGuard<'a, State<T>>,
        patience: Patience,
    ) -> Wait<'a, T> {
        match patience {
            Patience::Poll => Wait::Refused,
            Patience::Block => {
                trace!(len = state.ring.len(), "parking");
                Wait::Woken(condvar.wait(state).unwrap_or_else(PoisonError::into_inner))
            }
            Patience::Until(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Wait::Expired;
                }
                trace!(len = state.ring.len(), "parking with deadline");
                let (guard, _) = condvar
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner);
                Wait::Woken(guard)
            }
        }
    }

    /// Lock the state, recovering from poisoning.
    ///
    /// Every critical section leaves the ring consistent before anything that
    /// can panic runs, so a poisoned lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockingQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.ring.len())
            .field("closed", &state.closed)
            .finish()
    }
}



/// Loom tests: every interleaving of small producer/consumer programs.
///
/// Timed operations are left out; loom does not model the passage of time.
#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    /// Preemption bound used unless `LOOM_MAX_PREEMPTIONS` is set. Unbounded
    /// exploration of the two-producer case does not finish.
    const PREEMPTION_BOUND: usize = 3;

    fn model<F>(f: F)
    where
        F: Fn() + Sync + Send + 'static,
    {
        let mut builder = loom::model::Builder::new();
        if builder.preemption_bound.is_none() {
            builder.preemption_bound = Some(PREEMPTION_BOUND);
        }
        builder.check(f);
    }

    #[test]
    fn test_handoff_through_single_slot() {
        model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());

            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    queue.put(1).unwrap();
                    queue.put(2).unwrap();
                })
            };

            assert_eq!(queue.get(), Ok(1));
            assert_eq!(queue.get(), Ok(2));
            producer.join().unwrap();
        });
    }

    #[test]
    fn test_two_consumers_one_producer() {
        model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());

            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || queue.get().unwrap())
                })
                .collect();

            queue.put(1).unwrap();
            queue.put(2).unwrap();

            let mut got: Vec<u32> = consumers.into_iter().map(|h| h.join().unwrap()).collect();
            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
        });
    }

    #[test]
    fn test_two_producers_keep_their_order() {
        model(|| {
            let queue = Arc::new(BlockingQueue::new(1).unwrap());

            let producers: Vec<_> = [10u32, 20]
                .into_iter()
                .map(|base| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        queue.put(base + 1).unwrap();
                        queue.put(base + 2).unwrap();
                    })
                })
                .collect();

            let got: Vec<u32> = (0..4).map(|_| queue.get().unwrap()).collect();
            for producer in producers {
                producer.join().unwrap();
            }

            for base in [10, 20] {
                let lane: Vec<u32> = got.iter().copied().filter(|v| v / 10 * 10 == base).collect();
                assert_eq!(lane, vec![base + 1, base + 2]);
            }
        });
    }

    #[test]
    fn test_close_releases_waiters() {
        model(|| {
            let queue = Arc::new(BlockingQueue::<u32>::new(1).unwrap());

            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.get())
            };

            queue.put(1).unwrap();
            queue.close();

            // `get` drains before it reports `Closed`, so the item is always
            // delivered.
            match consumer.join().unwrap() {
                Ok(1) => assert!(queue.is_empty()),
                Err(GetError::Closed) => panic!("item lost on close"),
                other => panic!("unexpected result: {:?}", other),
            }
        });
    }
}
