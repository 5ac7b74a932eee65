//! Fixed-capacity circular buffer.
//!
//! Storage is allocated once at construction and never grows. `head` is the
//! oldest element, `tail` the next free slot, and `count` alone decides
//! empty versus full: with `head == tail` the buffer is either empty
//! (`count == 0`) or full (`count == capacity`).
//!
//! The buffer does no locking and no blocking. Pushing into a full buffer or
//! popping an empty one is a caller bug and panics; `BlockingQueue` only
//! calls these operations once its wait predicate holds.

use std::fmt;

use crate::error::CapacityError;

/// Fixed-capacity FIFO ring.
pub struct CircularBuffer<T> {
    /// `None` marks a vacant slot.
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> CircularBuffer<T> {
    /// Allocate `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns `CapacityError` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError { requested: capacity });
        }

        Ok(Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Append `item` at the tail.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    pub fn push_back(&mut self, item: T) {
        assert!(
            !self.is_full(),
            "push_back on a full buffer (capacity {})",
            self.capacity()
        );
        debug_assert!(self.slots[self.tail].is_none(), "tail slot {} occupied", self.tail);

        self.slots[self.tail] = Some(item);
        self.tail = self.advance(self.tail);
        self.count += 1;

        debug_assert_eq!(self.tail, (self.head + self.count) % self.capacity());
    }

    /// Remove and return the element at the head.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty.
    pub fn pop_front(&mut self) -> T {
        assert!(!self.is_empty(), "pop_front on an empty buffer");

        let head = self.head;
        let item = self.slots[head].take();
        self.head = self.advance(head);
        self.count -= 1;

        debug_assert_eq!(self.tail, (self.head + self.count) % self.capacity());
        item.unwrap_or_else(|| unreachable!("live slot {} was vacant", head))
    }

    /// Live elements from head to tail, without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.count).filter_map(move |offset| self.slots[(self.head + offset) % capacity].as_ref())
    }

    /// Next index, wrapping to 0 at capacity.
    ///
    /// Same as `(index + 1) % capacity` without the division.
    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity() {
            0
        } else {
            next
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CircularBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}


/// Model-based tests against `VecDeque`.
/// Set MQ_PROPTEST_CASES to control the number of cases (default 256).
#[cfg(all(test, not(miri)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn proptest_cases() -> u32 {
        std::env::var("MQ_PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256)
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u32),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(proptest_cases()))]

        #[test]
        fn prop_matches_vecdeque(
            capacity in 1usize..8,
            ops in prop::collection::vec(op(), 0..200)
        ) {
            let mut ring = CircularBuffer::new(capacity).unwrap();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(v) if model.len() < capacity => {
                        ring.push_back(v);
                        model.push_back(v);
                    }
                    Op::Pop if !model.is_empty() => {
                        prop_assert_eq!(Some(ring.pop_front()), model.pop_front());
                    }
                    _ => {}
                }

                prop_assert_eq!(ring.len(), model.len());
                prop_assert!(ring.len() <= ring.capacity());
                prop_assert_eq!(ring.is_empty(), model.is_empty());
                prop_assert_eq!(ring.is_full(), model.len() == capacity);
                prop_assert_eq!(ring.iter().copied().collect::<Vec<_>>(), model.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
