//! Arg-max action selection for evaluation.

use super::trait_::{validate_distribution, ActionSampler, SampleError};
use crate::environment::Action;

/// Always selects the most probable action (lowest index on ties).
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySampler;

impl ActionSampler for GreedySampler {
    fn sample(&mut self, probs: &[f64]) -> Result<Action, SampleError> {
        validate_distribution(probs)?;
        let mut best = 0;
        for (i, p) in probs.iter().enumerate().skip(1) {
            if *p > probs[best] {
                best = i;
            }
        }
        Ok(best)
    }

    fn name(&self) -> &str {
        "greedy"
    }
}
