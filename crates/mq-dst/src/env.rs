//! Deterministic environment: one seed drives scheduling and faults.

use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Seeded source of scheduling decisions and faults for one DST run.
#[derive(Debug, Clone)]
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
}

impl DstEnv {
    /// Environment with the default fault configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    #[must_use]
    pub fn with_fault_config(seed: u64, config: FaultConfig) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        // Separate streams so enabling faults does not reshuffle the schedule.
        Self {
            seed,
            rng: DeterministicRng::new(seed),
            fault: FaultInjector::new(DeterministicRng::new(seed.wrapping_add(1)), config),
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_reproducible() {
        let mut a = DstEnv::new(4242);
        let mut b = DstEnv::new(4242);
        for _ in 0..100 {
            assert_eq!(a.rng().gen_range(0..1000_u32), b.rng().gen_range(0..1000_u32));
            assert_eq!(a.fault().should_stall(), b.fault().should_stall());
        }
        assert_eq!(a.seed(), 4242);
    }

    #[test]
    fn test_fault_stream_independent_of_schedule() {
        // Drawing scheduling decisions must not shift the fault sequence.
        let faults = |draws: usize| {
            let mut env = DstEnv::with_fault_config(9, FaultConfig::aggressive());
            for _ in 0..draws {
                env.rng().gen_range(0..10_u32);
            }
            (0..50).map(|_| env.fault().should_expire()).collect::<Vec<_>>()
        };
        assert_eq!(faults(0), faults(17));
    }
}
