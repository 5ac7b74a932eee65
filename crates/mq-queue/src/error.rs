//! Error types for queue construction and rejected operations.

use std::fmt;

use thiserror::Error;

/// Requested capacity cannot hold anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue capacity must be at least 1, got {requested}")]
pub struct CapacityError {
    pub requested: usize,
}

/// A rejected `put`. The item is handed back to the caller.
#[derive(Clone, PartialEq, Eq, Error)]
pub enum PutError<T> {
    /// `try_put` found no free slot.
    #[error("queue is full")]
    Full(T),
    /// No slot freed up before the deadline.
    #[error("timed out waiting for a free slot")]
    TimedOut(T),
    /// The queue was closed before the item could be placed.
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PutError<T> {
    /// Recover the item that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PutError::Full(item) | PutError::TimedOut(item) | PutError::Closed(item) => item,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, PutError::Closed(_))
    }
}

// Debug without requiring `T: Debug`.
impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutError::Full(_) => f.write_str("Full(..)"),
            PutError::TimedOut(_) => f.write_str("TimedOut(..)"),
            PutError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// A rejected `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GetError {
    /// `try_get` found nothing buffered.
    #[error("queue is empty")]
    Empty,
    /// Nothing arrived before the deadline.
    #[error("timed out waiting for an item")]
    TimedOut,
    /// The queue is closed and fully drained.
    #[error("queue is closed and drained")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CapacityError { requested: 0 }.to_string(),
            "queue capacity must be at least 1, got 0"
        );
        assert_eq!(PutError::Full(1).to_string(), "queue is full");
        assert_eq!(GetError::Closed.to_string(), "queue is closed and drained");
    }

    #[test]
    fn test_put_error_returns_item() {
        struct Opaque(u8);

        let err = PutError::Closed(Opaque(9));
        assert!(err.is_closed());
        assert_eq!(format!("{:?}", err), "Closed(..)");
        assert_eq!(err.into_inner().0, 9);
        assert_eq!(PutError::TimedOut("x").into_inner(), "x");
    }
}
