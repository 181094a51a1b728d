use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ErrorSimulation;

/// Decides which steps are failed on purpose, independently of how the service responded.
pub trait FailureInjector: Debug + Send + Sync {
    /// Called once per step. Returning true fails the step.
    fn should_fail(&mut self) -> bool;
}

/// Never fails a step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFailures;

impl FailureInjector for NoFailures {
    fn should_fail(&mut self) -> bool {
        false
    }
}

/// Fails each step independently with a fixed probability.
#[derive(Debug)]
pub struct RandomFailures {
    rate: f64,
    rng: StdRng,
}

impl RandomFailures {
    /// `rate` is clamped into `[0.0, 1.0]`.
    pub fn new(rate: f64) -> Self {
        Self {
            rate: clamp_rate(rate),
            rng: StdRng::from_entropy(),
        }
    }

    /// Same as [RandomFailures::new] but the sequence of failures is repeatable.
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self {
            rate: clamp_rate(rate),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

impl FailureInjector for RandomFailures {
    fn should_fail(&mut self) -> bool {
        self.rng.gen_bool(self.rate)
    }
}

/// Build the injector for one virtual user.
///
/// With a configured seed every virtual user gets its own seed derived from it, so that virtual
/// users don't fail in lockstep but a run can still be repeated exactly.
pub fn failure_injector(simulation: &ErrorSimulation, vuser_id: u32) -> Box<dyn FailureInjector> {
    if !simulation.enabled {
        return Box::new(NoFailures);
    }

    match simulation.seed {
        Some(seed) => Box::new(RandomFailures::seeded(
            simulation.rate,
            seed.wrapping_add(u64::from(vuser_id)),
        )),
        None => Box::new(RandomFailures::new(simulation.rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure_count(injector: &mut dyn FailureInjector, draws: usize) -> usize {
        (0..draws).filter(|_| injector.should_fail()).count()
    }

    #[test]
    fn seeded_rate_matches_within_tolerance() {
        let draws = 20_000;
        let mut injector = RandomFailures::seeded(0.05, 42);

        let observed = failure_count(&mut injector, draws) as f64 / draws as f64;

        // Standard deviation at p = 0.05 over 20k draws is about 0.0015.
        assert!(
            (0.04..=0.06).contains(&observed),
            "observed failure rate {observed}"
        );
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomFailures::seeded(0.3, 7);
        let mut b = RandomFailures::seeded(0.3, 7);

        let a: Vec<bool> = (0..100).map(|_| a.should_fail()).collect();
        let b: Vec<bool> = (0..100).map(|_| b.should_fail()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn edge_rates() {
        assert_eq!(0, failure_count(&mut RandomFailures::seeded(0.0, 1), 1000));
        assert_eq!(1000, failure_count(&mut RandomFailures::seeded(1.0, 1), 1000));
        assert_eq!(1.0, RandomFailures::new(3.0).rate());
        assert_eq!(0.0, RandomFailures::new(f64::NAN).rate());
    }

    #[test]
    fn disabled_simulation_never_fails() {
        let simulation = ErrorSimulation {
            enabled: false,
            rate: 1.0,
            seed: None,
        };
        let mut injector = failure_injector(&simulation, 1);
        assert_eq!(0, failure_count(injector.as_mut(), 1000));
    }

    #[test]
    fn virtual_users_get_different_sequences() {
        let simulation = ErrorSimulation {
            enabled: true,
            rate: 0.5,
            seed: Some(99),
        };
        let mut first = failure_injector(&simulation, 1);
        let mut second = failure_injector(&simulation, 2);

        let first: Vec<bool> = (0..64).map(|_| first.should_fail()).collect();
        let second: Vec<bool> = (0..64).map(|_| second.should_fail()).collect();
        assert_ne!(first, second);
    }
}
