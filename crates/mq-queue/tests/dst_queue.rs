//! DST runs of `BlockingQueue` under simulated producers and consumers.
//!
//! Reproduce a failure with `DST_SEED=<seed> cargo test -p mq-queue --test dst_queue`.

use std::time::Duration;

use mq_dst::{dst_iterations, get_or_generate_seed, DstHarness, DstTestableQueue, FaultConfig, HarnessConfig, Rejection};
use mq_queue::{BlockingQueue, GetError, PutError};

/// The harness trait lives in `mq-dst`, so wrap the queue locally.
struct SimQueue(BlockingQueue<u64>);

fn put_rejection(err: PutError<u64>) -> Rejection {
    match err {
        PutError::Full(_) => Rejection::Full,
        PutError::TimedOut(_) => Rejection::TimedOut,
        PutError::Closed(_) => Rejection::Closed,
    }
}

fn get_rejection(err: GetError) -> Rejection {
    match err {
        GetError::Empty => Rejection::Empty,
        GetError::TimedOut => Rejection::TimedOut,
        GetError::Closed => Rejection::Closed,
    }
}

impl DstTestableQueue for SimQueue {
    fn new(capacity: usize) -> Self {
        SimQueue(BlockingQueue::new(capacity).expect("harness capacity is non-zero"))
    }

    fn try_put(&self, item: u64) -> Result<(), Rejection> {
        self.0.try_put(item).map_err(put_rejection)
    }

    fn try_get(&self) -> Result<u64, Rejection> {
        self.0.try_get().map_err(get_rejection)
    }

    fn put_expired(&self, item: u64) -> Result<(), Rejection> {
        self.0.put_timeout(item, Duration::ZERO).map_err(put_rejection)
    }

    fn get_expired(&self) -> Result<u64, Rejection> {
        self.0.get_timeout(Duration::ZERO).map_err(get_rejection)
    }

    fn close(&self) {
        self.0.close();
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn contents(&self) -> Vec<u64> {
        self.0.snapshot()
    }
}

#[test]
fn test_dst_quick() {
    let mut harness: DstHarness<SimQueue> = DstHarness::new(12345, HarnessConfig::quick());
    let result = harness.run();

    println!("{}", result);
    assert!(result.all_invariants_held, "{}", result);
    assert!(harness.queue().0.is_empty());
}

#[test]
fn test_dst_random_seeds() {
    let base_seed = get_or_generate_seed();
    let iterations = dst_iterations(20);

    for i in 0..iterations {
        let seed = base_seed.wrapping_add(i).max(1);
        let mut harness: DstHarness<SimQueue> = DstHarness::new(seed, HarnessConfig::default());
        let result = harness.run();

        if !result.all_invariants_held {
            if let Some(ce) = &result.counterexample {
                println!("{}", ce.render_diagram());
            }
            panic!("DST_SEED={} failed: {}", seed, result);
        }
    }
}

#[test]
fn test_dst_stress() {
    let seed = get_or_generate_seed();
    let mut harness: DstHarness<SimQueue> = DstHarness::new(seed, HarnessConfig::stress());
    let result = harness.run();

    println!("{}", result);
    assert!(result.all_invariants_held, "{}", result);
    assert!(result.faults_injected_count > 0);
}

#[test]
fn test_dst_capacity_one_handoff() {
    let config = HarnessConfig {
        capacity: 1,
        producers_count: 3,
        consumers_count: 3,
        fault_config: FaultConfig::default(),
        ..HarnessConfig::default()
    };
    let mut harness: DstHarness<SimQueue> = DstHarness::new(99, config);
    let result = harness.run();

    assert!(result.all_invariants_held, "{}", result);
    assert!(result.parked_count > 0);
}

#[test]
fn test_dst_close_mid_run() {
    let seed = get_or_generate_seed();
    let config = HarnessConfig {
        close_after_steps: Some(40),
        ..HarnessConfig::default()
    };
    let mut harness: DstHarness<SimQueue> = DstHarness::new(seed, config);
    let result = harness.run();

    assert!(result.all_invariants_held, "{}", result);
    assert!(harness.queue().0.is_closed());
}
