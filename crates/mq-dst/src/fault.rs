//! Fault injection at operation boundaries.
//!
//! Faults never happen inside the queue's critical section. They model what
//! the surrounding program does to a queue operation:
//!
//! | Fault | Effect on a simulated thread |
//! |-------|------------------------------|
//! | Stall | Skips its turn (slow or descheduled thread) |
//! | Expiry | Uses a deadline that has already passed instead of a non-blocking probe |

use crate::random::DeterministicRng;

/// Fault probabilities, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    /// Probability that a picked thread stalls instead of acting
    pub stall_probability: f64,
    /// Probability that an operation runs with an already-expired deadline
    pub expiry_probability: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            stall_probability: 0.05,
            expiry_probability: 0.1,
        }
    }
}

impl FaultConfig {
    /// No faults.
    #[must_use]
    pub fn none() -> Self {
        Self {
            stall_probability: 0.0,
            expiry_probability: 0.0,
        }
    }

    /// Frequent faults for stress runs.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            stall_probability: 0.25,
            expiry_probability: 0.4,
        }
    }
}

/// Counters for injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub stalls_count: u64,
    pub expiries_count: u64,
    pub faults_count: u64,
}

/// Decides, deterministically, when to inject a fault.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.stall_probability),
            "stall_probability out of range"
        );
        debug_assert!(
            (0.0..=1.0).contains(&config.expiry_probability),
            "expiry_probability out of range"
        );
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    pub fn should_stall(&mut self) -> bool {
        let hit = self.config.stall_probability > 0.0 && self.rng.gen_bool(self.config.stall_probability);
        if hit {
            self.stats.stalls_count += 1;
            self.stats.faults_count += 1;
        }
        hit
    }

    pub fn should_expire(&mut self) -> bool {
        let hit = self.config.expiry_probability > 0.0 && self.rng.gen_bool(self.config.expiry_probability);
        if hit {
            self.stats.expiries_count += 1;
            self.stats.faults_count += 1;
        }
        hit
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fires() {
        let mut injector = FaultInjector::new(DeterministicRng::new(5), FaultConfig::none());
        for _ in 0..1000 {
            assert!(!injector.should_stall());
            assert!(!injector.should_expire());
        }
        assert_eq!(injector.stats(), FaultStats::default());
    }

    #[test]
    fn test_certain_faults_always_fire() {
        let config = FaultConfig {
            stall_probability: 1.0,
            expiry_probability: 1.0,
        };
        let mut injector = FaultInjector::new(DeterministicRng::new(5), config);
        for _ in 0..10 {
            assert!(injector.should_stall());
            assert!(injector.should_expire());
        }
        let stats = injector.stats();
        assert_eq!(stats.stalls_count, 10);
        assert_eq!(stats.expiries_count, 10);
        assert_eq!(stats.faults_count, 20);
    }

    #[test]
    fn test_fault_sequence_is_reproducible() {
        let run = |seed| {
            let mut injector = FaultInjector::new(DeterministicRng::new(seed), FaultConfig::aggressive());
            (0..200).map(|_| injector.should_stall()).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }
}
