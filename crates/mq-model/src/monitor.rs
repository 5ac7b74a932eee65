//! Stateright model of the bounded-buffer monitor.
//!
//! Threads run Mesa-style monitor steps. A step holds the lock for its whole
//! duration: the thread checks its predicate, and either performs its
//! operation and signals, or starts waiting on a condition. A waiting thread
//! is not runnable until a signal makes it ready again, after which it
//! re-checks its predicate like any other thread.
//!
//! `notify_one` may wake any waiter on the condition; the choice is part of
//! the action so the checker explores every choice.
//!
//! # Properties
//!
//! | Property | Kind | Meaning |
//! |----------|------|---------|
//! | bounded capacity | always | `count <= capacity` |
//! | fifo | always | delivered items followed by buffered items equal accepted items |
//! | no deadlock | always | some thread is runnable unless all are done |
//! | all delivered | sometimes | every thread finishes |

use stateright::{Model, Property};

/// Item identity: `(producer, seq)`.
pub type Item = (u8, u8);

/// How producers and consumers share condition variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signalling {
    /// `not_full` and `not_empty`, each signalled with notify-one.
    SplitConditions,
    /// One condition for both predicates, signalled with notify-one.
    SharedNotifyOne,
    /// One condition for both predicates, signalled with notify-all.
    SharedNotifyAll,
}

/// Condition variable a thread waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    NotFull,
    NotEmpty,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    /// Runnable: will acquire the lock and (re-)check its predicate.
    Ready,
    /// Parked on a condition.
    Waiting(Cond),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadState {
    pub role: Role,
    pub status: ThreadStatus,
    /// Operations left to perform.
    pub remaining: u8,
    /// Next sequence number to put (producers only).
    pub next_seq: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorState {
    /// Ring storage, `None` for vacant slots.
    pub slots: Vec<Option<Item>>,
    pub head: usize,
    pub count: usize,
    pub threads: Vec<ThreadState>,
    /// Items whose put completed, in order.
    pub accepted: Vec<Item>,
    /// Items returned by get, in order.
    pub delivered: Vec<Item>,
}

impl MonitorState {
    /// Buffered items, head first.
    pub fn contents(&self) -> Vec<Item> {
        let capacity = self.slots.len();
        (0..self.count)
            .filter_map(|offset| self.slots[(self.head + offset) % capacity])
            .collect()
    }

    /// Every live thread is parked.
    pub fn is_deadlocked(&self) -> bool {
        let live = self.threads.iter().filter(|t| t.status != ThreadStatus::Done);
        live.clone().count() > 0 && live.clone().all(|t| matches!(t.status, ThreadStatus::Waiting(_)))
    }

    fn waiters(&self, cond: Cond) -> impl Iterator<Item = usize> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.status == ThreadStatus::Waiting(cond))
            .map(|(i, _)| i)
    }
}

/// One monitor step by `thread`.
///
/// `wake` is the waiter chosen by notify-one if the step signals. It is
/// ignored for waits and for notify-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorAction {
    pub thread: usize,
    pub wake: Option<usize>,
}

/// Producers and consumers sharing one bounded buffer.
#[derive(Debug, Clone)]
pub struct MonitorModel {
    pub capacity: usize,
    pub signalling: Signalling,
    /// Puts per producer.
    pub producers: Vec<u8>,
    /// Gets per consumer.
    pub consumers: Vec<u8>,
}

impl MonitorModel {
    pub fn new(capacity: usize, signalling: Signalling, producers: Vec<u8>, consumers: Vec<u8>) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        debug_assert_eq!(
            producers.iter().map(|&n| u32::from(n)).sum::<u32>(),
            consumers.iter().map(|&n| u32::from(n)).sum::<u32>(),
            "puts and gets must balance"
        );
        Self {
            capacity,
            signalling,
            producers,
            consumers,
        }
    }

    /// One producer putting twice, two consumers getting once each, capacity 1.
    ///
    /// Smallest configuration where a shared condition with notify-one can
    /// wake a consumer when only the producer could make progress.
    pub fn lost_wakeup_scenario(signalling: Signalling) -> Self {
        Self::new(1, signalling, vec![2], vec![1, 1])
    }

    fn cond_for_wait(&self, role: Role) -> Cond {
        match (self.signalling, role) {
            (Signalling::SplitConditions, Role::Producer) => Cond::NotFull,
            (Signalling::SplitConditions, Role::Consumer) => Cond::NotEmpty,
            _ => Cond::Shared,
        }
    }

    /// Condition signalled after `role` completes an operation.
    fn cond_for_signal(&self, role: Role) -> Cond {
        match (self.signalling, role) {
            (Signalling::SplitConditions, Role::Producer) => Cond::NotEmpty,
            (Signalling::SplitConditions, Role::Consumer) => Cond::NotFull,
            _ => Cond::Shared,
        }
    }

    fn can_proceed(&self, state: &MonitorState, role: Role) -> bool {
        match role {
            Role::Producer => state.count < self.capacity,
            Role::Consumer => state.count > 0,
        }
    }

    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity {
            0
        } else {
            next
        }
    }
}

impl Model for MonitorModel {
    type State = MonitorState;
    type Action = MonitorAction;

    fn init_states(&self) -> Vec<Self::State> {
        let producers = self.producers.iter().map(|&n| (Role::Producer, n));
        let consumers = self.consumers.iter().map(|&n| (Role::Consumer, n));
        let threads = producers
            .chain(consumers)
            .map(|(role, remaining)| ThreadState {
                role,
                status: if remaining == 0 {
                    ThreadStatus::Done
                } else {
                    ThreadStatus::Ready
                },
                remaining,
                next_seq: 0,
            })
            .collect();

        vec![MonitorState {
            slots: vec![None; self.capacity],
            head: 0,
            count: 0,
            threads,
            accepted: Vec::new(),
            delivered: Vec::new(),
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (thread, t) in state.threads.iter().enumerate() {
            if t.status != ThreadStatus::Ready {
                continue;
            }

            let signals = self.can_proceed(state, t.role) && self.signalling != Signalling::SharedNotifyAll;
            if !signals {
                actions.push(MonitorAction { thread, wake: None });
                continue;
            }

            let cond = self.cond_for_signal(t.role);
            let mut waiters = state.waiters(cond).filter(|&w| w != thread).peekable();
            if waiters.peek().is_none() {
                actions.push(MonitorAction { thread, wake: None });
            }
            for wake in waiters {
                actions.push(MonitorAction {
                    thread,
                    wake: Some(wake),
                });
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let idx = action.thread;
        if last_state.threads.get(idx)?.status != ThreadStatus::Ready {
            return None;
        }
        if let Some(wake) = action.wake {
            let cond = self.cond_for_signal(last_state.threads[idx].role);
            if last_state.threads.get(wake)?.status != ThreadStatus::Waiting(cond) {
                return None;
            }
        }

        let mut state = last_state.clone();
        let role = state.threads[idx].role;

        if !self.can_proceed(&state, role) {
            state.threads[idx].status = ThreadStatus::Waiting(self.cond_for_wait(role));
            return Some(state);
        }

        match role {
            Role::Producer => {
                let item = (idx as u8, state.threads[idx].next_seq);
                let tail = (state.head + state.count) % self.capacity;
                state.slots[tail] = Some(item);
                state.count += 1;
                state.accepted.push(item);
                state.threads[idx].next_seq += 1;
            }
            Role::Consumer => {
                let item = state.slots[state.head].take()?;
                state.head = self.advance(state.head);
                state.count -= 1;
                state.delivered.push(item);
            }
        }

        let thread = &mut state.threads[idx];
        thread.remaining -= 1;
        thread.status = if thread.remaining == 0 {
            ThreadStatus::Done
        } else {
            ThreadStatus::Ready
        };

        let cond = self.cond_for_signal(role);
        if self.signalling == Signalling::SharedNotifyAll {
            for t in &mut state.threads {
                if t.status == ThreadStatus::Waiting(cond) {
                    t.status = ThreadStatus::Ready;
                }
            }
        } else if let Some(wake) = action.wake {
            state.threads[wake].status = ThreadStatus::Ready;
        }

        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("bounded capacity", |model: &MonitorModel, state: &MonitorState| {
                state.count <= model.capacity
            }),
            Property::always("fifo", |_: &MonitorModel, state: &MonitorState| {
                let mut observed = state.delivered.clone();
                observed.extend(state.contents());
                observed == state.accepted
            }),
            Property::always("no deadlock", |_: &MonitorModel, state: &MonitorState| {
                !state.is_deadlocked()
            }),
            Property::sometimes("all delivered", |_: &MonitorModel, state: &MonitorState| {
                state.threads.iter().all(|t| t.status == ThreadStatus::Done)
            }),
        ]
    }
}
