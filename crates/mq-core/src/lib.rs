//! # mq-core
//!
//! Core types and invariants for verifying the bounded blocking queue.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `QueueProperties`, the observation surface a queue exposes to the checker
//!
//! The checker is implementation-agnostic: the real `BlockingQueue`, the
//! simulated runs in `mq-dst` and hand-written fakes in tests all feed the
//! same invariants.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, StateSnapshot, ThreadAction};
pub use invariants::{lane_of, tag_item, QueueProperties, QueuePropertyChecker};
pub use property::{PropertyChecker, PropertyResult};
