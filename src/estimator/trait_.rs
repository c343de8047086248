//! Estimator trait consumed by the trainers.

use crate::environment::Observation;
use crate::error::EstimatorError;
use crate::training::TrainingBatch;

/// Batched output of a forward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    /// One probability row per observation.
    pub action_probs: Vec<Vec<f64>>,
    /// One scalar value estimate per observation.
    pub values: Vec<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Maps observations to action distributions and value estimates, and
/// learns from flushed experience.
///
/// The trainer is the sole caller of [`update`](Self::update), once per
/// flush. Probability rows must be non-negative and sum to 1.
pub trait PolicyValueEstimator {
    /// Size of the discrete action space.
    fn num_actions(&self) -> usize;

    /// Forward pass over a batch of observations.
    fn predict(&mut self, observations: &[Observation]) -> Result<Prediction, EstimatorError>;

    /// Applies one parameter update and returns the scalar loss.
    fn update(&mut self, batch: &TrainingBatch) -> Result<f64, EstimatorError>;

    /// Returns a human-readable name for this estimator.
    fn name(&self) -> &str {
        "estimator"
    }
}

impl<P: PolicyValueEstimator + ?Sized> PolicyValueEstimator for Box<P> {
    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn predict(&mut self, observations: &[Observation]) -> Result<Prediction, EstimatorError> {
        (**self).predict(observations)
    }

    fn update(&mut self, batch: &TrainingBatch) -> Result<f64, EstimatorError> {
        (**self).update(batch)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
