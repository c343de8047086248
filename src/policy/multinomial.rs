//! Stochastic multinomial sampling used during training.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::trait_::{validate_distribution, ActionSampler, SampleError};
use crate::environment::Action;

/// Draws each action with the probability the estimator assigns to it.
///
/// Seed it with [`MultinomialSampler::seeded`] for reproducible runs.
#[derive(Debug, Clone)]
pub struct MultinomialSampler {
    rng: StdRng,
}

impl MultinomialSampler {
    /// Creates a sampler with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a sampler seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl ActionSampler for MultinomialSampler {
    fn sample(&mut self, probs: &[f64]) -> Result<Action, SampleError> {
        validate_distribution(probs)?;
        let dist = WeightedIndex::new(probs).map_err(|_| SampleError::NotADistribution {
            sum: probs.iter().sum(),
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    fn name(&self) -> &str {
        "multinomial"
    }
}
