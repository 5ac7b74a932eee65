//! # mq-model
//!
//! Exhaustive model checking of the monitor behind `mq_queue::BlockingQueue`.
//!
//! The model explores every interleaving of small producer/consumer
//! programs, including every choice `notify_one` can make. It compares three
//! signalling disciplines:
//!
//! - split `not_full` / `not_empty` conditions with notify-one (what the
//!   queue does): capacity, FIFO and deadlock freedom all hold
//! - one shared condition with notify-one: a consumer can be woken when only
//!   the producer could proceed, and every thread ends up parked
//! - one shared condition with notify-all: correct, at the cost of waking
//!   threads that will only wait again
//!
//! ## Usage
//!
//! ```ignore
//! use mq_model::{MonitorModel, Signalling};
//! use stateright::{Checker, Model};
//!
//! MonitorModel::lost_wakeup_scenario(Signalling::SplitConditions)
//!     .checker()
//!     .spawn_bfs()
//!     .join()
//!     .assert_properties();
//! ```
//!
//! Discovered traces can be replayed against the real queue with
//! [`replay()`], which drives it through `try_put` / `try_get` and compares
//! each step with the model.

pub mod monitor;
pub mod replay;

pub use monitor::{Cond, Item, MonitorAction, MonitorModel, MonitorState, Role, Signalling, ThreadState, ThreadStatus};
pub use replay::{replay, ReplayResult};
