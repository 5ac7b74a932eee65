//! # mq-dst
//!
//! Deterministic Simulation Testing for the bounded blocking queue.
//!
//! Real threads make a failing interleaving hard to reproduce. The harness
//! instead simulates producer and consumer threads on a single OS thread:
//! a seeded RNG picks which simulated thread acts next, a simulated thread
//! whose operation cannot proceed is parked until a counterpart completes an
//! operation, and faults
//! (stalls, expired deadlines) are injected at operation boundaries. The
//! queue under test is driven through its non-blocking and zero-timeout
//! operations, so the code exercised is the production code.
//!
//! ## Usage
//!
//! ```rust
//! use mq_dst::DstEnv;
//!
//! let mut env = DstEnv::new(12345);
//! let choice = env.rng().gen_range(0..10_u32);
//! assert!(choice < 10);
//! if env.fault().should_stall() {
//!     // skip this simulated thread's turn
//! }
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test -p mq-queue --test dst_queue
//! ```

pub mod env;
pub mod fault;
pub mod harness;
pub mod random;

pub use env::DstEnv;
pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use harness::{DstHarness, DstTestableQueue, HarnessConfig, HarnessResult, Rejection};
pub use random::DeterministicRng;

/// Get DST seed from environment or generate a random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>().max(1);
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}

/// Number of DST iterations, from `DST_ITERATIONS` or the given default.
#[must_use]
pub fn dst_iterations(default: u64) -> u64 {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
