//! Sampler trait for the rollout layer.

use thiserror::Error;

use crate::environment::Action;

/// Tolerance on the sum of a probability row.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A probability row that cannot be sampled from.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("probability vector is empty")]
    Empty,

    #[error("probabilities must be finite and non-negative and sum to 1 (sum = {sum})")]
    NotADistribution { sum: f64 },
}

/// Chooses one discrete action from an estimator's probability row.
///
/// Rows that are not valid distributions are rejected rather than
/// renormalized, so estimator defects surface as errors.
pub trait ActionSampler {
    /// Selects an action index in `0..probs.len()`.
    fn sample(&mut self, probs: &[f64]) -> Result<Action, SampleError>;

    /// Returns a human-readable name for this sampler.
    fn name(&self) -> &str;
}

impl<S: ActionSampler + ?Sized> ActionSampler for &mut S {
    fn sample(&mut self, probs: &[f64]) -> Result<Action, SampleError> {
        (**self).sample(probs)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Checks that `probs` is non-empty, non-negative and sums to 1.
pub fn validate_distribution(probs: &[f64]) -> Result<(), SampleError> {
    if probs.is_empty() {
        return Err(SampleError::Empty);
    }
    let sum: f64 = probs.iter().sum();
    let well_formed = probs.iter().all(|p| p.is_finite() && *p >= 0.0);
    if !well_formed || (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(SampleError::NotADistribution { sum });
    }
    Ok(())
}
