// packages/engine/src/session/sampler.rs
//! Session sampling decisions

use crate::session::state::Sampled;
use crate::utils::config::SampleRates;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws sampling decisions from the configured rates
#[derive(Debug)]
pub struct Sampler {
    rates: SampleRates,
    rng: StdRng,
}

impl Sampler {
    pub fn new(rates: SampleRates) -> Self {
        Self {
            rates,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sampler for reproducible runs
    pub fn with_seed(rates: SampleRates, seed: u64) -> Self {
        Self {
            rates,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rates(&self) -> SampleRates {
        self.rates
    }

    /// Decision for a new session: `Session` or `NotSampled`
    ///
    /// The error rate is not consulted here; unsampled sessions stay eligible
    /// for an upgrade when an error occurs.
    pub fn sample_session(&mut self) -> Sampled {
        if self.draw(self.rates.session_sample_rate) {
            Sampled::Session
        } else {
            Sampled::NotSampled
        }
    }

    /// Whether an error on an unsampled session triggers recording
    pub fn sample_error(&mut self) -> bool {
        self.draw(self.rates.error_sample_rate)
    }

    fn draw(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            false
        } else if rate >= 1.0 {
            true
        } else {
            self.rng.gen::<f64>() < rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rates(session: f64, error: f64) -> SampleRates {
        SampleRates {
            session_sample_rate: session,
            error_sample_rate: error,
        }
    }

    #[test]
    fn test_session_rate_distribution() {
        let mut sampler = Sampler::with_seed(rates(0.2, 0.0), 0x5eed);
        let trials = 100_000;

        let sampled = (0..trials)
            .filter(|_| sampler.sample_session() == Sampled::Session)
            .count();

        let observed = sampled as f64 / trials as f64;
        // ~8 standard deviations at n = 100k
        assert!((observed - 0.2).abs() < 0.01, "observed rate {}", observed);
    }

    #[test]
    fn test_error_rate_not_used_for_new_sessions() {
        let mut sampler = Sampler::with_seed(rates(0.0, 1.0), 1);
        for _ in 0..100 {
            assert_eq!(sampler.sample_session(), Sampled::NotSampled);
        }
        assert!(sampler.sample_error());
    }

    proptest! {
        #[test]
        fn prop_zero_rate_never_samples(seed in any::<u64>()) {
            let mut sampler = Sampler::with_seed(rates(0.0, 0.0), seed);
            prop_assert_eq!(sampler.sample_session(), Sampled::NotSampled);
            prop_assert!(!sampler.sample_error());
        }

        #[test]
        fn prop_full_rate_always_samples(seed in any::<u64>()) {
            let mut sampler = Sampler::with_seed(rates(1.0, 1.0), seed);
            prop_assert_eq!(sampler.sample_session(), Sampled::Session);
            prop_assert!(sampler.sample_error());
        }

        #[test]
        fn prop_new_sessions_never_error_sampled(seed in any::<u64>(), session in 0.0f64..=1.0, error in 0.0f64..=1.0) {
            let mut sampler = Sampler::with_seed(rates(session, error), seed);
            prop_assert_ne!(sampler.sample_session(), Sampled::Error);
        }
    }
}
