//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking a single named property.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Property name (e.g., "FifoOrder")
    pub name: &'static str,
    /// Whether the property held
    pub passed: bool,
    /// Explanation of the violation
    pub message: Option<String>,
    /// Failure path, when the checker could build one
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A property that held.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            message: None,
            counterexample: None,
        }
    }

    /// A property that was violated.
    #[must_use]
    pub fn fail(
        name: &'static str,
        message: impl Into<String>,
        counterexample: Option<Counterexample>,
    ) -> Self {
        Self {
            name,
            passed: false,
            message: Some(message.into()),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "[PASS] {}", self.name)
        } else {
            write!(
                f,
                "[FAIL] {}: {}",
                self.name,
                self.message.as_deref().unwrap_or("violated")
            )
        }
    }
}

/// Something that can check a set of properties against observed state.
pub trait PropertyChecker {
    /// Check every property, in a stable order.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True if every property holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.passed)
    }

    /// First violated property, if any.
    fn first_failure(&self) -> Option<PropertyResult> {
        self.check_all().into_iter().find(|r| !r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PropertyResult>);

    impl PropertyChecker for Fixed {
        fn check_all(&self) -> Vec<PropertyResult> {
            self.0.clone()
        }
    }

    #[test]
    fn test_all_hold_and_first_failure() {
        let ok = Fixed(vec![PropertyResult::pass("A"), PropertyResult::pass("B")]);
        assert!(ok.all_hold());
        assert!(ok.first_failure().is_none());

        let bad = Fixed(vec![
            PropertyResult::pass("A"),
            PropertyResult::fail("B", "b broke", None),
            PropertyResult::fail("C", "c broke", None),
        ]);
        assert!(!bad.all_hold());
        assert_eq!(bad.first_failure().map(|r| r.name), Some("B"));
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyResult::pass("FifoOrder").to_string(), "[PASS] FifoOrder");
        assert_eq!(
            PropertyResult::fail("BoundedCapacity", "4 > 3", None).to_string(),
            "[FAIL] BoundedCapacity: 4 > 3"
        );
    }
}
