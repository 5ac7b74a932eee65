//! Kani proof harnesses for the circular buffer.
//!
//! Bounded model checking of the ring index arithmetic: for every sequence
//! of pushes and pops up to the unwind bound, the buffer behaves like a FIFO
//! of fixed capacity.
//!
//! # Running the proofs
//!
//! ```bash
//! cargo kani -p mq-queue
//! cargo kani -p mq-queue --harness proof_wraparound_preserves_order
//! ```
//!
//! Kani does not execute threads, so these proofs say nothing about the
//! blocking layer. Loom and the `mq-model` state machine cover that.

#[cfg(kani)]
mod proofs {
    use crate::ring::CircularBuffer;

    /// A pushed value comes straight back out of an otherwise empty buffer.
    #[kani::proof]
    #[kani::unwind(5)]
    fn proof_push_pop_roundtrip() {
        let capacity: usize = kani::any();
        kani::assume(capacity >= 1 && capacity <= 4);

        let mut ring = CircularBuffer::new(capacity).unwrap();
        let value: u32 = kani::any();

        ring.push_back(value);
        kani::assert(ring.len() == 1, "one push means one item");
        kani::assert(ring.pop_front() == value, "pop must return the pushed value");
        kani::assert(ring.is_empty(), "buffer must be empty again");
    }

    /// Zero capacity is always refused.
    #[kani::proof]
    fn proof_zero_capacity_rejected() {
        kani::assert(
            CircularBuffer::<u8>::new(0).is_err(),
            "zero capacity must be rejected",
        );
    }

    /// After an arbitrary number of rotations, order still holds across the
    /// end of the array.
    #[kani::proof]
    #[kani::unwind(6)]
    fn proof_wraparound_preserves_order() {
        let mut ring = CircularBuffer::new(3).unwrap();

        // Move head and tail to an arbitrary offset.
        let offset: usize = kani::any();
        kani::assume(offset <= 4);
        for i in 0..offset {
            ring.push_back(i as u32);
            ring.pop_front();
        }

        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let c: u32 = kani::any();
        ring.push_back(a);
        ring.push_back(b);
        ring.push_back(c);
        kani::assert(ring.is_full(), "three pushes fill capacity three");

        kani::assert(ring.pop_front() == a, "first in, first out");
        kani::assert(ring.pop_front() == b, "second in, second out");
        kani::assert(ring.pop_front() == c, "third in, third out");
        kani::assert(ring.is_empty(), "drained");
    }

    /// The count never leaves `0..=capacity` under any operation sequence.
    #[kani::proof]
    #[kani::unwind(7)]
    fn proof_len_bounded() {
        let mut ring = CircularBuffer::new(2).unwrap();

        for _ in 0..6 {
            let push: bool = kani::any();
            if push && !ring.is_full() {
                ring.push_back(0u8);
            } else if !push && !ring.is_empty() {
                ring.pop_front();
            }
            kani::assert(ring.len() <= ring.capacity(), "len exceeded capacity");
            kani::assert(ring.is_empty() == (ring.len() == 0), "empty flag mismatch");
            kani::assert(ring.is_full() == (ring.len() == 2), "full flag mismatch");
        }
    }
}

// Proofs only run under `cargo kani`.
#[cfg(not(kani))]
mod proofs {}

#[cfg(test)]
mod tests {
    use crate::ring::CircularBuffer;

    /// Same scenario as `proof_wraparound_preserves_order` at fixed offsets,
    /// so regular test runs exercise it too.
    #[test]
    fn test_wraparound_at_every_offset() {
        for offset in 0..=4u32 {
            let mut ring = CircularBuffer::new(3).unwrap();
            for i in 0..offset {
                ring.push_back(i);
                ring.pop_front();
            }
            for v in [10, 20, 30] {
                ring.push_back(v);
            }
            assert!(ring.is_full());
            assert_eq!(
                [ring.pop_front(), ring.pop_front(), ring.pop_front()],
                [10, 20, 30]
            );
        }
    }
}
