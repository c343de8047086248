//! Linear softmax actor with a linear critic, trained by plain gradient descent.
//!
//! Loss per row, averaged over the batch:
//!
//! ```text
//! -A · log π(a|s) + c_v · ½ (V(s) − R)² − c_e · H(π(·|s))
//! ```

use super::trait_::{PolicyValueEstimator, Prediction};
use crate::config::ActorCriticConfig;
use crate::environment::Observation;
use crate::error::{EstimatorError, TrainError};
use crate::training::TrainingBatch;

/// Actor-critic with one linear layer per head over `[observation, 1]`.
///
/// Weights start at zero, so the initial policy is uniform and the initial
/// value estimate is 0.
#[derive(Debug, Clone)]
pub struct LinearActorCritic {
    obs_dim: usize,
    num_actions: usize,
    /// Row-major `num_actions × (obs_dim + 1)`.
    policy_weights: Vec<f64>,
    /// `obs_dim + 1`.
    value_weights: Vec<f64>,
    config: ActorCriticConfig,
}

impl LinearActorCritic {
    /// Creates a new estimator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(
        obs_dim: usize,
        num_actions: usize,
        config: ActorCriticConfig,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        Ok(Self {
            obs_dim,
            num_actions,
            policy_weights: vec![0.0; num_actions * (obs_dim + 1)],
            value_weights: vec![0.0; obs_dim + 1],
            config,
        })
    }

    pub fn observation_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn config(&self) -> &ActorCriticConfig {
        &self.config
    }

    fn check_width(&self, observation: &[f64]) -> Result<(), EstimatorError> {
        if observation.len() != self.obs_dim {
            return Err(EstimatorError::ObservationWidth {
                expected: self.obs_dim,
                actual: observation.len(),
            });
        }
        Ok(())
    }

    /// Affine map of one weight row over the observation plus bias.
    fn affine(row: &[f64], observation: &[f64]) -> f64 {
        let (weights, bias) = row.split_at(row.len() - 1);
        weights
            .iter()
            .zip(observation)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + bias[0]
    }

    fn policy_row(&self, observation: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .policy_weights
            .chunks(self.obs_dim + 1)
            .map(|row| Self::affine(row, observation))
            .collect();
        softmax(&logits)
    }

    fn value(&self, observation: &[f64]) -> f64 {
        Self::affine(&self.value_weights, observation)
    }

    fn check_batch(&self, batch: &TrainingBatch) -> Result<(), EstimatorError> {
        let n = batch.len();
        if batch.actions_one_hot.len() != n
            || batch.returns.len() != n
            || batch.advantages.len() != n
        {
            return Err(EstimatorError::MalformedBatch(format!(
                "{} observations, {} actions, {} returns, {} advantages",
                n,
                batch.actions_one_hot.len(),
                batch.returns.len(),
                batch.advantages.len()
            )));
        }
        for (obs, action) in batch.observations.iter().zip(&batch.actions_one_hot) {
            self.check_width(obs)?;
            if action.len() != self.num_actions {
                return Err(EstimatorError::MalformedBatch(format!(
                    "one-hot action has width {}, expected {}",
                    action.len(),
                    self.num_actions
                )));
            }
        }
        Ok(())
    }
}

impl PolicyValueEstimator for LinearActorCritic {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn predict(&mut self, observations: &[Observation]) -> Result<Prediction, EstimatorError> {
        let mut prediction = Prediction {
            action_probs: Vec::with_capacity(observations.len()),
            values: Vec::with_capacity(observations.len()),
        };
        for obs in observations {
            self.check_width(obs)?;
            prediction.action_probs.push(self.policy_row(obs));
            prediction.values.push(self.value(obs));
        }
        Ok(prediction)
    }

    fn update(&mut self, batch: &TrainingBatch) -> Result<f64, EstimatorError> {
        self.check_batch(batch)?;
        if batch.is_empty() {
            return Ok(0.0);
        }

        let width = self.obs_dim + 1;
        let scale = 1.0 / batch.len() as f64;
        let mut policy_grad = vec![0.0; self.policy_weights.len()];
        let mut value_grad = vec![0.0; width];
        let mut loss = 0.0;

        for i in 0..batch.len() {
            let obs = &batch.observations[i];
            let action = &batch.actions_one_hot[i];
            let advantage = batch.advantages[i];
            let probs = self.policy_row(obs);
            let value = self.value(obs);

            let entropy: f64 = -probs
                .iter()
                .filter(|p| **p > 0.0)
                .map(|p| p * p.ln())
                .sum::<f64>();
            let log_prob_taken: f64 = probs
                .iter()
                .zip(action)
                .filter(|(_, a)| **a != 0.0)
                .map(|(p, a)| a * p.ln())
                .sum();
            let value_err = value - batch.returns[i];

            loss += -advantage * log_prob_taken
                + self.config.critic_coef * 0.5 * value_err * value_err
                - self.config.entropy_coef * entropy;

            for (j, p) in probs.iter().enumerate() {
                let entropy_term = if *p > 0.0 {
                    self.config.entropy_coef * p * (p.ln() + entropy)
                } else {
                    0.0
                };
                let d_logit = -advantage * (action[j] - p) + entropy_term;
                let row = &mut policy_grad[j * width..(j + 1) * width];
                for (k, x) in obs.iter().enumerate() {
                    row[k] += scale * d_logit * x;
                }
                row[self.obs_dim] += scale * d_logit;
            }

            let d_value = self.config.critic_coef * value_err;
            for (k, x) in obs.iter().enumerate() {
                value_grad[k] += scale * d_value * x;
            }
            value_grad[self.obs_dim] += scale * d_value;
        }

        let lr = self.config.learning_rate;
        for (w, g) in self.policy_weights.iter_mut().zip(&policy_grad) {
            *w -= lr * g;
        }
        for (w, g) in self.value_weights.iter_mut().zip(&value_grad) {
            *w -= lr * g;
        }
        Ok(loss * scale)
    }

    fn name(&self) -> &str {
        "linear-actor-critic"
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
