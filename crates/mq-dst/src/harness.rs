//! DST harness for bounded queues.
//!
//! Simulated producers and consumers take turns on one OS thread. Each turn
//! the seeded scheduler picks a ready simulated thread; its operation either
//! completes or the thread parks (the simulated counterpart of waiting on a
//! condition variable). A parked thread is not scheduled again until a
//! counterpart completes an operation or the queue closes. It then re-checks,
//! like a woken waiter, and may park again if another thread got there first.
//!
//! Besides the queue invariants from `mq-core`, the harness checks the
//! blocking contract directly: the simulation is the only mutator, so a
//! rejection while a slot or item was available is a bug, and so is a state
//! where every live thread is parked (a lost wakeup).

use std::collections::VecDeque;
use std::fmt;

use mq_core::{
    tag_item, Counterexample, PropertyChecker, QueueProperties, QueuePropertyChecker, StateSnapshot, ThreadAction,
};

use crate::env::DstEnv;
use crate::fault::FaultConfig;

/// Recent actions kept for counterexamples.
const TRACE_LEN_MAX: usize = 64;

/// Why a queue refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No free slot (non-blocking put)
    Full,
    /// No buffered item (non-blocking get)
    Empty,
    /// Deadline passed before the operation could proceed
    TimedOut,
    /// Queue closed
    Closed,
}

/// Queue surface the harness drives.
///
/// Only non-blocking and already-expired operations are used: a blocking
/// call would hang the single thread that runs the simulation.
pub trait DstTestableQueue {
    fn new(capacity: usize) -> Self
    where
        Self: Sized;
    fn try_put(&self, item: u64) -> Result<(), Rejection>;
    fn try_get(&self) -> Result<u64, Rejection>;
    /// Timed put whose deadline has already passed.
    fn put_expired(&self, item: u64) -> Result<(), Rejection>;
    /// Timed get whose deadline has already passed.
    fn get_expired(&self) -> Result<u64, Rejection>;
    fn close(&self);
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    /// Buffered items, head to tail.
    fn contents(&self) -> Vec<u64>;
}

/// Configuration for a DST run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Queue capacity
    pub capacity: usize,
    /// Simulated producer threads
    pub producers_count: u32,
    /// Simulated consumer threads
    pub consumers_count: u32,
    /// Items each producer puts; consumers split the total between them
    pub items_per_producer: u32,
    /// Fault injection configuration
    pub fault_config: FaultConfig,
    /// Check invariants every N steps (0 = only at the end)
    pub invariant_check_interval: u64,
    /// Close the queue after this many steps
    pub close_after_steps: Option<u64>,
    /// Upper bound on scheduler steps
    pub steps_max: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            producers_count: 2,
            consumers_count: 2,
            items_per_producer: 50,
            fault_config: FaultConfig::default(),
            invariant_check_interval: 10,
            close_after_steps: None,
            steps_max: 100_000,
        }
    }
}

impl HarnessConfig {
    /// Configuration for stress testing.
    #[must_use]
    pub fn stress() -> Self {
        Self {
            capacity: 3,
            producers_count: 4,
            consumers_count: 3,
            items_per_producer: 200,
            fault_config: FaultConfig::aggressive(),
            invariant_check_interval: 50,
            close_after_steps: None,
            steps_max: 1_000_000,
        }
    }

    /// Configuration for quick testing.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            capacity: 2,
            producers_count: 1,
            consumers_count: 1,
            items_per_producer: 20,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 5,
            close_after_steps: None,
            steps_max: 10_000,
        }
    }

    fn total_items(&self) -> u64 {
        u64::from(self.producers_count) * u64::from(self.items_per_producer)
    }
}

/// Result of a DST run.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Seed used for reproduction
    pub seed: u64,
    /// Scheduler steps taken
    pub steps_count: u64,
    /// Completed puts and gets
    pub operations_count: u64,
    /// Times a simulated thread parked
    pub parked_count: u64,
    /// Operations refused because the queue was closed
    pub closed_rejections_count: u64,
    /// Faults injected
    pub faults_injected_count: u64,
    /// Invariant checks performed
    pub invariant_checks_count: u64,
    /// Whether all invariants held
    pub all_invariants_held: bool,
    /// First violation (if any)
    pub first_violation: Option<String>,
    /// Recent actions leading to the violation
    pub counterexample: Option<Counterexample>,
}

impl fmt::Display for HarnessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.all_invariants_held { "PASS" } else { "FAIL" };
        write!(
            f,
            "[{}] DST_SEED={} steps={} ops={} parked={} closed={} faults={} checks={}",
            status,
            self.seed,
            self.steps_count,
            self.operations_count,
            self.parked_count,
            self.closed_rejections_count,
            self.faults_injected_count,
            self.invariant_checks_count
        )?;
        if let Some(ref violation) = self.first_violation {
            write!(f, "\n  Violation: {}", violation)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Producer { lane: u32, next_seq: u32, remaining: u32 },
    Consumer { remaining: u64 },
}

impl Role {
    fn is_producer(&self) -> bool {
        matches!(self, Role::Producer { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ready,
    /// Waiting for a counterpart to complete an operation.
    Parked,
    Done,
}

#[derive(Debug, Clone)]
struct SimThread {
    role: Role,
    status: Status,
}

/// Deterministic simulation of producers and consumers sharing one queue.
pub struct DstHarness<Q: DstTestableQueue> {
    queue: Q,
    env: DstEnv,
    config: HarnessConfig,
    threads: Vec<SimThread>,
    accepted: Vec<u64>,
    delivered: Vec<u64>,
    peak_len: u64,
    closed: bool,
    trace: VecDeque<(ThreadAction, StateSnapshot)>,
    step: u64,
    operations_count: u64,
    parked_count: u64,
    closed_rejections_count: u64,
    invariant_checks_count: u64,
    violation: Option<(String, Option<Counterexample>)>,
}

impl<Q: DstTestableQueue> DstHarness<Q> {
    /// Create a harness with a fresh queue of `config.capacity`.
    pub fn new(seed: u64, config: HarnessConfig) -> Self {
        Self::with_queue(seed, Q::new(config.capacity), config)
    }

    /// Create a harness around an existing (empty) queue.
    pub fn with_queue(seed: u64, queue: Q, config: HarnessConfig) -> Self {
        debug_assert!(config.producers_count > 0, "Must have at least one producer");
        debug_assert!(config.consumers_count > 0, "Must have at least one consumer");
        debug_assert!(queue.len() == 0, "Queue must start empty");

        let mut threads = Vec::new();
        for lane in 0..config.producers_count {
            threads.push(SimThread {
                role: Role::Producer {
                    lane,
                    next_seq: 0,
                    remaining: config.items_per_producer,
                },
                status: Status::Ready,
            });
        }

        // Spread the total over consumers so gets balance puts exactly.
        let consumers = u64::from(config.consumers_count);
        let total = config.total_items();
        for i in 0..consumers {
            let share = total / consumers + u64::from(i < total % consumers);
            threads.push(SimThread {
                role: Role::Consumer { remaining: share },
                status: Status::Ready,
            });
        }

        for thread in &mut threads {
            let finished = match thread.role {
                Role::Producer { remaining, .. } => remaining == 0,
                Role::Consumer { remaining } => remaining == 0,
            };
            if finished {
                thread.status = Status::Done;
            }
        }

        Self {
            queue,
            env: DstEnv::with_fault_config(seed, config.fault_config),
            config,
            threads,
            accepted: Vec::new(),
            delivered: Vec::new(),
            peak_len: 0,
            closed: false,
            trace: VecDeque::with_capacity(TRACE_LEN_MAX),
            step: 0,
            operations_count: 0,
            parked_count: 0,
            closed_rejections_count: 0,
            invariant_checks_count: 0,
            violation: None,
        }
    }

    /// Get the seed for reproduction.
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// The queue under test.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Run until every simulated thread finishes or a violation is found.
    pub fn run(&mut self) -> HarnessResult {
        while self.violation.is_none() {
            if self.threads.iter().all(|t| t.status == Status::Done) {
                break;
            }
            if self.step >= self.config.steps_max {
                self.stop(format!("Step budget of {} exhausted", self.config.steps_max));
                break;
            }

            if self.config.close_after_steps == Some(self.step) && !self.closed {
                self.queue.close();
                self.closed = true;
                self.wake(|_| true);
            }

            let ready: Vec<usize> = self
                .threads
                .iter()
                .enumerate()
                .filter(|(_, t)| t.status == Status::Ready)
                .map(|(i, _)| i)
                .collect();
            let Some(&idx) = self.env.rng().choose(&ready) else {
                self.stop(format!(
                    "Every live thread is parked (len={}, capacity={}): lost wakeup",
                    self.queue.len(),
                    self.queue.capacity()
                ));
                break;
            };
            self.step += 1;

            if self.env.fault().should_stall() {
                self.record(idx, "stall".to_string(), false);
            } else {
                self.act(idx);
            }

            self.peak_len = self.peak_len.max(self.queue.len() as u64);

            let interval = self.config.invariant_check_interval;
            if self.violation.is_none() && interval > 0 && self.step % interval == 0 {
                self.check_invariants();
            }
        }

        if self.violation.is_none() {
            self.check_invariants();
        }

        self.build_result()
    }

    fn act(&mut self, idx: usize) {
        let expired = self.env.fault().should_expire();
        match self.threads[idx].role {
            Role::Producer {
                lane,
                next_seq,
                remaining,
            } => {
                let item = tag_item(lane, next_seq);
                let len_before = self.queue.len();
                let result = if expired {
                    self.queue.put_expired(item)
                } else {
                    self.queue.try_put(item)
                };
                match result {
                    Ok(()) => {
                        if self.closed {
                            self.stop(format!("put({}) succeeded on a closed queue", item));
                            return;
                        }
                        self.accepted.push(item);
                        self.operations_count += 1;
                        let remaining = remaining - 1;
                        self.threads[idx].role = Role::Producer {
                            lane,
                            next_seq: next_seq + 1,
                            remaining,
                        };
                        self.threads[idx].status = if remaining == 0 { Status::Done } else { Status::Ready };
                        self.wake(|role| !role.is_producer());
                        self.record(idx, format!("put({})", item), true);
                    }
                    Err(Rejection::Full) | Err(Rejection::TimedOut) => {
                        if len_before < self.queue.capacity() && !self.closed {
                            self.stop(format!("put({}) refused with {} free slots", item, self.queue.capacity() - len_before));
                            return;
                        }
                        self.park(idx, format!("put({})", item));
                    }
                    Err(Rejection::Closed) => {
                        if !self.closed {
                            self.stop(format!("put({}) reported Closed on an open queue", item));
                            return;
                        }
                        self.closed_rejections_count += 1;
                        self.threads[idx].status = Status::Done;
                        self.record(idx, format!("put({}) closed", item), false);
                    }
                    Err(Rejection::Empty) => self.stop(format!("put({}) reported Empty", item)),
                }
            }
            Role::Consumer { remaining } => {
                let len_before = self.queue.len();
                let result = if expired {
                    self.queue.get_expired()
                } else {
                    self.queue.try_get()
                };
                match result {
                    Ok(item) => {
                        self.delivered.push(item);
                        self.operations_count += 1;
                        let remaining = remaining - 1;
                        self.threads[idx].role = Role::Consumer { remaining };
                        self.threads[idx].status = if remaining == 0 { Status::Done } else { Status::Ready };
                        self.wake(Role::is_producer);
                        self.record(idx, format!("get() -> {}", item), true);
                    }
                    Err(Rejection::Empty) | Err(Rejection::TimedOut) => {
                        if len_before > 0 {
                            self.stop(format!("get() refused with {} buffered items", len_before));
                            return;
                        }
                        self.park(idx, "get()".to_string());
                    }
                    Err(Rejection::Closed) => {
                        if !self.closed || len_before > 0 {
                            self.stop(format!(
                                "get() reported Closed (closed={}, buffered={})",
                                self.closed, len_before
                            ));
                            return;
                        }
                        self.closed_rejections_count += 1;
                        self.threads[idx].status = Status::Done;
                        self.record(idx, "get() closed".to_string(), false);
                    }
                    Err(Rejection::Full) => self.stop("get() reported Full".to_string()),
                }
            }
        }
    }

    fn park(&mut self, idx: usize, action: String) {
        self.parked_count += 1;
        self.threads[idx].status = Status::Parked;
        self.record(idx, action, false);
    }

    /// Make parked threads whose role matches runnable again.
    fn wake(&mut self, matches: impl Fn(&Role) -> bool) {
        for thread in &mut self.threads {
            if thread.status == Status::Parked && matches(&thread.role) {
                thread.status = Status::Ready;
            }
        }
    }

    fn record(&mut self, idx: usize, action: String, success: bool) {
        if self.trace.len() == TRACE_LEN_MAX {
            self.trace.pop_front();
        }
        let contents = self.queue.contents();
        let state = StateSnapshot {
            step: self.step,
            description: format!("len={}", contents.len()),
            variables: vec![("contents".to_string(), format!("{:?}", contents))],
        };
        let action = ThreadAction {
            thread_id: idx as u64,
            step: self.step,
            action,
            success,
        };
        self.trace.push_back((action, state));
    }

    fn check_invariants(&mut self) {
        self.invariant_checks_count += 1;
        let failure = QueuePropertyChecker::new(&*self)
            .with_seed(self.seed())
            .first_failure();
        if let Some(result) = failure {
            let message = result.to_string();
            let detail = result.counterexample.and_then(|ce| ce.states.into_iter().last());
            self.fail(message, detail);
        }
    }

    fn stop(&mut self, message: String) {
        self.fail(message, None);
    }

    /// Record the first violation with the retained trace. `detail` is the
    /// checker's own snapshot and goes after the last traced step.
    fn fail(&mut self, message: String, detail: Option<StateSnapshot>) {
        if self.violation.is_some() {
            return;
        }
        let mut ce = Counterexample::with_seed(self.seed()).with_description(message.clone());
        // Renumber so the diagram only spans the retained window.
        for (i, (action, state)) in self.trace.iter().enumerate() {
            let step = i as u64 + 1;
            ce.add_action(ThreadAction { step, ..action.clone() });
            ce.add_state(StateSnapshot { step, ..state.clone() });
        }
        if let Some(detail) = detail {
            ce.add_state(StateSnapshot {
                step: self.trace.len() as u64 + 1,
                ..detail
            });
        }
        self.violation = Some((message, Some(ce)));
    }

    fn build_result(&mut self) -> HarnessResult {
        let (first_violation, counterexample) = match self.violation.clone() {
            Some((message, ce)) => (Some(message), ce),
            None => (None, None),
        };

        HarnessResult {
            seed: self.seed(),
            steps_count: self.step,
            operations_count: self.operations_count,
            parked_count: self.parked_count,
            closed_rejections_count: self.closed_rejections_count,
            faults_injected_count: self.env.fault().stats().faults_count,
            invariant_checks_count: self.invariant_checks_count,
            all_invariants_held: first_violation.is_none(),
            first_violation,
            counterexample,
        }
    }
}

impl<Q: DstTestableQueue> QueueProperties for DstHarness<Q> {
    fn accepted_items(&self) -> Vec<u64> {
        self.accepted.clone()
    }

    fn delivered_items(&self) -> Vec<u64> {
        self.delivered.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.queue.contents()
    }

    fn capacity(&self) -> u64 {
        self.queue.capacity() as u64
    }

    fn peak_len(&self) -> u64 {
        self.peak_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Reference queue: `VecDeque` with a bound.
    struct RefQueue {
        items: RefCell<VecDeque<u64>>,
        capacity: usize,
        closed: Cell<bool>,
    }

    impl DstTestableQueue for RefQueue {
        fn new(capacity: usize) -> Self {
            Self {
                items: RefCell::new(VecDeque::new()),
                capacity,
                closed: Cell::new(false),
            }
        }
        fn try_put(&self, item: u64) -> Result<(), Rejection> {
            if self.closed.get() {
                return Err(Rejection::Closed);
            }
            let mut items = self.items.borrow_mut();
            if items.len() == self.capacity {
                return Err(Rejection::Full);
            }
            items.push_back(item);
            Ok(())
        }
        fn try_get(&self) -> Result<u64, Rejection> {
            match self.items.borrow_mut().pop_front() {
                Some(item) => Ok(item),
                None if self.closed.get() => Err(Rejection::Closed),
                None => Err(Rejection::Empty),
            }
        }
        fn put_expired(&self, item: u64) -> Result<(), Rejection> {
            self.try_put(item).map_err(|e| if e == Rejection::Full { Rejection::TimedOut } else { e })
        }
        fn get_expired(&self) -> Result<u64, Rejection> {
            self.try_get().map_err(|e| if e == Rejection::Empty { Rejection::TimedOut } else { e })
        }
        fn close(&self) {
            self.closed.set(true);
        }
        fn len(&self) -> usize {
            self.items.borrow().len()
        }
        fn capacity(&self) -> usize {
            self.capacity
        }
        fn contents(&self) -> Vec<u64> {
            self.items.borrow().iter().copied().collect()
        }
    }

    /// Silently drops every fifth accepted item.
    struct LossyQueue {
        inner: RefQueue,
        puts: Cell<u64>,
    }

    impl DstTestableQueue for LossyQueue {
        fn new(capacity: usize) -> Self {
            Self {
                inner: RefQueue::new(capacity),
                puts: Cell::new(0),
            }
        }
        fn try_put(&self, item: u64) -> Result<(), Rejection> {
            self.inner.try_put(item)?;
            self.puts.set(self.puts.get() + 1);
            if self.puts.get() % 5 == 0 {
                self.inner.items.borrow_mut().pop_back();
            }
            Ok(())
        }
        fn try_get(&self) -> Result<u64, Rejection> {
            self.inner.try_get()
        }
        fn put_expired(&self, item: u64) -> Result<(), Rejection> {
            self.try_put(item)
        }
        fn get_expired(&self) -> Result<u64, Rejection> {
            self.inner.get_expired()
        }
        fn close(&self) {
            self.inner.close();
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
        fn contents(&self) -> Vec<u64> {
            self.inner.contents()
        }
    }

    /// Moves every second accepted item to the head when something is
    /// already buffered.
    struct JumpingQueue {
        inner: RefQueue,
        puts: Cell<u64>,
    }

    impl DstTestableQueue for JumpingQueue {
        fn new(capacity: usize) -> Self {
            Self {
                inner: RefQueue::new(capacity),
                puts: Cell::new(0),
            }
        }
        fn try_put(&self, item: u64) -> Result<(), Rejection> {
            self.inner.try_put(item)?;
            self.puts.set(self.puts.get() + 1);
            let mut items = self.inner.items.borrow_mut();
            if self.puts.get() % 2 == 0 && items.len() > 1 {
                items.pop_back();
                items.push_front(item);
            }
            Ok(())
        }
        fn try_get(&self) -> Result<u64, Rejection> {
            self.inner.try_get()
        }
        fn put_expired(&self, item: u64) -> Result<(), Rejection> {
            self.try_put(item)
        }
        fn get_expired(&self) -> Result<u64, Rejection> {
            self.inner.get_expired()
        }
        fn close(&self) {
            self.inner.close();
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
        fn capacity(&self) -> usize {
            self.inner.capacity()
        }
        fn contents(&self) -> Vec<u64> {
            self.inner.contents()
        }
    }

    #[test]
    fn test_reference_queue_quick() {
        let mut harness: DstHarness<RefQueue> = DstHarness::new(12345, HarnessConfig::quick());
        let result = harness.run();

        assert!(result.all_invariants_held, "{}", result);
        assert_eq!(result.operations_count, 40);
        assert!(harness.queue().contents().is_empty());
    }

    #[test]
    fn test_reference_queue_with_faults() {
        let config = HarnessConfig {
            fault_config: FaultConfig::aggressive(),
            ..HarnessConfig::default()
        };
        let mut harness: DstHarness<RefQueue> = DstHarness::new(777, config);
        let result = harness.run();

        assert!(result.all_invariants_held, "{}", result);
        assert_eq!(result.operations_count, 200);
        assert!(result.faults_injected_count > 0);
        assert!(result.parked_count > 0);
    }

    #[test]
    fn test_close_mid_run() {
        let config = HarnessConfig {
            close_after_steps: Some(30),
            ..HarnessConfig::default()
        };
        let mut harness: DstHarness<RefQueue> = DstHarness::new(31337, config);
        let result = harness.run();

        assert!(result.all_invariants_held, "{}", result);
        assert!(result.closed_rejections_count > 0);
        assert!(result.operations_count < 200);
    }

    #[test]
    fn test_detects_lost_items() {
        let mut harness: DstHarness<LossyQueue> = DstHarness::new(42, HarnessConfig::quick());
        let result = harness.run();

        assert!(!result.all_invariants_held);
        let violation = result.first_violation.unwrap();
        assert!(
            violation.contains("NoLostItems") || violation.contains("lost wakeup"),
            "unexpected violation: {}",
            violation
        );
        let diagram = result.counterexample.unwrap().render_diagram();
        assert!(diagram.contains("DST_SEED=42"));
        assert!(diagram.contains(" | len="));
        assert!(diagram.contains(" contents=["));
    }

    #[test]
    fn test_detects_reordering_with_final_state() {
        let config = HarnessConfig {
            items_per_producer: 50,
            ..HarnessConfig::quick()
        };
        let mut harness: DstHarness<JumpingQueue> = DstHarness::new(5, config);
        let result = harness.run();

        assert!(!result.all_invariants_held);
        let violation = result.first_violation.unwrap();
        assert!(violation.contains("FifoOrder"), "unexpected violation: {}", violation);

        let ce = result.counterexample.unwrap();
        let last = ce.states.last().unwrap();
        assert!(last.variables.iter().any(|(name, _)| name == "accepted"));
        let diagram = ce.render_diagram();
        assert!(diagram.contains(&format!("state at step {}", last.step)));
        assert!(diagram.contains("  accepted = ["));
    }

    #[test]
    fn test_parked_thread_waits_for_counterpart() {
        let config = HarnessConfig {
            capacity: 1,
            items_per_producer: 10,
            ..HarnessConfig::quick()
        };
        let mut harness: DstHarness<RefQueue> = DstHarness::new(8, config);
        let result = harness.run();
        assert!(result.all_invariants_held, "{}", result);
        assert!(result.parked_count > 0);

        // No faults, so every incomplete action is a park.
        let actions: Vec<&ThreadAction> = harness.trace.iter().map(|(action, _)| action).collect();
        assert_eq!(actions.len() as u64, result.steps_count);
        for (i, parked) in actions.iter().enumerate().filter(|(_, a)| !a.success) {
            let rest = &actions[i + 1..];
            let Some(next) = rest.iter().position(|a| a.thread_id == parked.thread_id) else {
                continue;
            };
            assert!(
                rest[..next].iter().any(|a| a.success && a.thread_id != parked.thread_id),
                "thread {} ran again after step {} without being woken",
                parked.thread_id,
                parked.step
            );
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut harness: DstHarness<RefQueue> = DstHarness::new(2024, HarnessConfig::default());
            let result = harness.run();
            (result.steps_count, result.parked_count, harness.delivered.clone())
        };
        assert_eq!(run(), run());
    }
}
