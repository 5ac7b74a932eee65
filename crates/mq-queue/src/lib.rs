//! # mq-queue
//!
//! A bounded blocking queue built from first principles: a fixed-capacity
//! circular buffer guarded by one mutex and two condition variables
//! ("not full" and "not empty"). Producers block while the queue is full,
//! consumers block while it is empty, and every state change wakes exactly
//! one waiter whose condition may now hold.
//!
//! # Modules
//!
//! - `ring`: `CircularBuffer`, the unsynchronized FIFO storage
//! - `blocking`: `BlockingQueue`, the monitor around the buffer
//! - `error`: construction and operation errors
//! - `tracked`: `TrackedQueue`, a `BlockingQueue<u64>` that records history
//!   for the invariant checker in `mq-core`
//! - `kani_proofs`: bounded proofs of the ring index arithmetic
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use mq_queue::BlockingQueue;
//!
//! let queue = Arc::new(BlockingQueue::new(30).unwrap());
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for n in 1..=100 {
//!             queue.put(n).unwrap();
//!         }
//!     })
//! };
//!
//! for expected in 1..=100 {
//!     assert_eq!(queue.get().unwrap(), expected);
//! }
//! producer.join().unwrap();
//! ```
//!
//! # Testing
//!
//! ```bash
//! cargo test -p mq-queue
//! RUSTFLAGS="--cfg loom" cargo test -p mq-queue --release --lib
//! cargo kani -p mq-queue
//! ```

pub mod blocking;
pub mod error;
pub mod kani_proofs;
pub mod ring;
mod sync;
pub mod tracked;

pub use blocking::BlockingQueue;
pub use error::{CapacityError, GetError, PutError};
pub use ring::CircularBuffer;
pub use tracked::TrackedQueue;
