//! Bounded blocking queue invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostItems | Every accepted item is delivered or still buffered |
//! | NoPhantomItems | Every delivered or buffered item was accepted |
//! | NoDuplicates | No item is delivered or buffered twice |
//! | FifoOrder | Items are delivered, then buffered, in exactly the order they were accepted |
//! | BoundedCapacity | The buffer never held more than `capacity` items |
//!
//! The history must be recorded in the order items entered and left the
//! buffer (under the queue lock, or from a single simulated thread). Check
//! at quiescence: a `put` that has returned but not yet been recorded looks
//! like a phantom delivery to the checker.

use std::collections::HashSet;

use crate::counterexample::{Counterexample, StateSnapshot};
use crate::invariants::lane_of;
use crate::property::{PropertyChecker, PropertyResult};

/// Observation surface a queue exposes to the checker.
pub trait QueueProperties {
    /// Items whose `put` completed, in the order they entered the buffer.
    fn accepted_items(&self) -> Vec<u64>;

    /// Items returned by `get`, in the order they left the buffer.
    fn delivered_items(&self) -> Vec<u64>;

    /// Items currently buffered, head to tail.
    fn current_contents(&self) -> Vec<u64>;

    /// Configured capacity.
    fn capacity(&self) -> u64;

    /// Largest length observed so far.
    fn peak_len(&self) -> u64;
}

/// Property checker for queue implementations.
pub struct QueuePropertyChecker<'a, Q: QueueProperties> {
    queue: &'a Q,
    dst_seed: Option<u64>,
}

impl<'a, Q: QueueProperties> QueuePropertyChecker<'a, Q> {
    #[must_use]
    pub fn new(queue: &'a Q) -> Self {
        Self {
            queue,
            dst_seed: None,
        }
    }

    /// Attach a DST seed so counterexamples can be replayed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self, description: String, variables: Vec<(String, String)>) -> Counterexample {
        let mut ce = match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        };
        ce.add_state(StateSnapshot {
            step: 1,
            description: description.clone(),
            variables,
        });
        ce.with_description(description)
    }

    fn check_no_lost_items(&self) -> PropertyResult {
        let accepted = self.queue.accepted_items();
        let delivered: HashSet<u64> = self.queue.delivered_items().into_iter().collect();
        let contents: HashSet<u64> = self.queue.current_contents().into_iter().collect();

        for item in &accepted {
            if !delivered.contains(item) && !contents.contains(item) {
                let ce = self.counterexample(
                    format!("Item {} lost", item),
                    vec![
                        ("accepted".to_string(), format!("{:?}", accepted)),
                        ("delivered".to_string(), format!("{:?}", delivered)),
                        ("contents".to_string(), format!("{:?}", contents)),
                    ],
                );
                return PropertyResult::fail(
                    "NoLostItems",
                    format!("Item {} was accepted but is neither delivered nor buffered", item),
                    Some(ce),
                );
            }
        }

        PropertyResult::pass("NoLostItems")
    }

    fn check_no_phantom_items(&self) -> PropertyResult {
        let accepted: HashSet<u64> = self.queue.accepted_items().into_iter().collect();

        let observed = self
            .queue
            .delivered_items()
            .into_iter()
            .chain(self.queue.current_contents());
        for item in observed {
            if !accepted.contains(&item) {
                return PropertyResult::fail(
                    "NoPhantomItems",
                    format!("Item {} was observed but never accepted", item),
                    None,
                );
            }
        }

        PropertyResult::pass("NoPhantomItems")
    }

    fn check_no_duplicates(&self) -> PropertyResult {
        let mut seen = HashSet::new();

        let observed = self
            .queue
            .delivered_items()
            .into_iter()
            .chain(self.queue.current_contents());
        for item in observed {
            if !seen.insert(item) {
                return PropertyResult::fail(
                    "NoDuplicates",
                    format!("Item {} was delivered or buffered twice", item),
                    None,
                );
            }
        }

        PropertyResult::pass("NoDuplicates")
    }

    fn check_fifo_order(&self) -> PropertyResult {
        let accepted = self.queue.accepted_items();
        let delivered = self.queue.delivered_items();
        let contents = self.queue.current_contents();

        // Items leave in exactly the order they entered: delivered, then
        // buffered, spells out the acceptance log.
        let observed = delivered.iter().chain(&contents);
        for (i, (got, want)) in observed.zip(&accepted).enumerate() {
            if got == want {
                continue;
            }
            let (place, at) = if i < delivered.len() {
                ("delivered", i)
            } else {
                ("buffered", i - delivered.len())
            };
            let ce = self.counterexample(
                format!("{} {} at position {} ahead of {}", place, got, at, want),
                vec![
                    ("accepted".to_string(), format!("{:?}", accepted)),
                    ("delivered".to_string(), format!("{:?}", delivered)),
                    ("contents".to_string(), format!("{:?}", contents)),
                ],
            );
            return PropertyResult::fail(
                "FifoOrder",
                format!(
                    "Item {} {} at position {} but {} (lane {}) was accepted before it",
                    got,
                    place,
                    at,
                    want,
                    lane_of(*want)
                ),
                Some(ce),
            );
        }

        PropertyResult::pass("FifoOrder")
    }

    fn check_bounded_capacity(&self) -> PropertyResult {
        let len = self.queue.current_contents().len() as u64;
        let peak = self.queue.peak_len();
        let capacity = self.queue.capacity();

        if len > capacity || peak > capacity {
            return PropertyResult::fail(
                "BoundedCapacity",
                format!(
                    "Buffer holds {} items (peak {}) but capacity is {}",
                    len, peak, capacity
                ),
                None,
            );
        }

        PropertyResult::pass("BoundedCapacity")
    }
}

impl<'a, Q: QueueProperties> PropertyChecker for QueuePropertyChecker<'a, Q> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_items(),
            self.check_no_phantom_items(),
            self.check_no_duplicates(),
            self.check_fifo_order(),
            self.check_bounded_capacity(),
        ]
    }
}
