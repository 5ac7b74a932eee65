//! Replay model traces against the real `BlockingQueue`.
//!
//! Each model step is mirrored onto the queue with its non-blocking
//! operations: a completed put becomes `try_put`, a completed get becomes
//! `try_get`, and a step that parks becomes the matching `Full` or `Empty`
//! probe. The queue must agree with the model at every step.

use mq_core::tag_item;
use mq_queue::{BlockingQueue, GetError, PutError};
use stateright::Model;

use crate::monitor::{Item, MonitorAction, MonitorModel, MonitorState, Role, ThreadStatus};

/// Outcome of replaying one trace.
#[derive(Debug, Clone)]
pub struct ReplayResult {
    /// Whether the queue agreed with the model at every step.
    pub passed: bool,
    /// Model steps replayed.
    pub steps_count: usize,
    /// Puts and gets that completed.
    pub operations_count: usize,
    /// First disagreement.
    pub error: Option<String>,
}

impl ReplayResult {
    fn fail(steps_count: usize, operations_count: usize, error: String) -> Self {
        Self {
            passed: false,
            steps_count,
            operations_count,
            error: Some(error),
        }
    }
}

fn encode(item: Item) -> u64 {
    tag_item(u32::from(item.0), u32::from(item.1))
}

/// Replay `actions` from the model's initial state.
pub fn replay(model: &MonitorModel, actions: &[MonitorAction]) -> ReplayResult {
    let queue = match BlockingQueue::new(model.capacity) {
        Ok(queue) => queue,
        Err(e) => return ReplayResult::fail(0, 0, e.to_string()),
    };
    let Some(mut state) = model.init_states().into_iter().next() else {
        return ReplayResult::fail(0, 0, "model has no initial state".to_string());
    };
    let mut operations_count = 0;

    for (step, &action) in actions.iter().enumerate() {
        let Some(next) = model.next_state(&state, action) else {
            return ReplayResult::fail(step, operations_count, format!("step {}: {:?} not enabled", step, action));
        };

        let parked = matches!(next.threads[action.thread].status, ThreadStatus::Waiting(_));
        let outcome = match state.threads[action.thread].role {
            Role::Producer => check_put(&queue, &state, action.thread, parked),
            Role::Consumer => check_get(&queue, &next, parked),
        };
        if let Err(e) = outcome {
            return ReplayResult::fail(step, operations_count, format!("step {}: {}", step, e));
        }
        if !parked {
            operations_count += 1;
        }

        let buffered: Vec<u64> = next.contents().into_iter().map(encode).collect();
        if queue.snapshot() != buffered {
            return ReplayResult::fail(
                step,
                operations_count,
                format!("step {}: queue holds {:?}, model holds {:?}", step, queue.snapshot(), buffered),
            );
        }
        state = next;
    }

    ReplayResult {
        passed: true,
        steps_count: actions.len(),
        operations_count,
        error: None,
    }
}

fn check_put(queue: &BlockingQueue<u64>, state: &MonitorState, thread: usize, parked: bool) -> Result<(), String> {
    let item = encode((thread as u8, state.threads[thread].next_seq));
    match (queue.try_put(item), parked) {
        (Ok(()), false) | (Err(PutError::Full(_)), true) => Ok(()),
        (result, _) => Err(format!(
            "put({}) returned {:?}, model {}",
            item,
            result,
            if parked { "parked" } else { "accepted" }
        )),
    }
}

fn check_get(queue: &BlockingQueue<u64>, next: &MonitorState, parked: bool) -> Result<(), String> {
    let expected = if parked {
        None
    } else {
        next.delivered.last().copied().map(encode)
    };
    match (queue.try_get(), expected) {
        (Ok(got), Some(want)) if got == want => Ok(()),
        (Err(GetError::Empty), None) => Ok(()),
        (result, want) => Err(format!("get() returned {:?}, model expected {:?}", result, want)),
    }
}
