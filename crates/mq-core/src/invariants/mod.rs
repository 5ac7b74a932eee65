//! Invariants for the bounded blocking queue.
//!
//! - `bounded_queue`: NoLostItems, NoPhantomItems, NoDuplicates, FifoOrder,
//!   BoundedCapacity
//!
//! Items are `u64`. Concurrent tests tag each item with the producer lane
//! that put it (high 32 bits) so a reordering can be traced back to the
//! producers involved.

pub mod bounded_queue;

pub use bounded_queue::{QueueProperties, QueuePropertyChecker};

/// Bit offset of the producer lane inside a tagged item.
pub const LANE_SHIFT: u32 = 32;

/// Build an item carrying its producer lane and per-lane sequence number.
#[must_use]
pub fn tag_item(lane: u32, seq: u32) -> u64 {
    (u64::from(lane) << LANE_SHIFT) | u64::from(seq)
}

/// Producer lane of a tagged item. Untagged items are all lane 0.
#[must_use]
pub fn lane_of(item: u64) -> u32 {
    (item >> LANE_SHIFT) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        let item = tag_item(3, 17);
        assert_eq!(lane_of(item), 3);
        assert_eq!(item & 0xFFFF_FFFF, 17);
        assert_eq!(lane_of(42), 0);
    }
}
