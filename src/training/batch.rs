//! Flattened experience handed to the estimator's update operation.

use super::buffer::RolloutBuffer;
use super::gae::compute_targets;
use crate::environment::{Action, Observation};
use crate::error::{Result, TrainError};

/// One row per transition across every slot of an accumulation window.
///
/// Rows are ordered slot by slot, then by time within a slot. All row
/// vectors have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingBatch {
    pub observations: Vec<Observation>,
    pub actions: Vec<Action>,
    pub actions_one_hot: Vec<Vec<f64>>,
    pub returns: Vec<f64>,
    pub advantages: Vec<f64>,
}

impl TrainingBatch {
    /// Builds a batch from closed slot buffers.
    ///
    /// Empty buffers contribute no rows.
    pub fn from_buffers(
        buffers: &[RolloutBuffer],
        num_actions: usize,
        gamma: f64,
        gae_lambda: f64,
    ) -> Result<Self> {
        let rows: usize = buffers.iter().map(RolloutBuffer::len).sum();
        let mut batch = Self {
            observations: Vec::with_capacity(rows),
            actions: Vec::with_capacity(rows),
            actions_one_hot: Vec::with_capacity(rows),
            returns: Vec::with_capacity(rows),
            advantages: Vec::with_capacity(rows),
        };

        for (slot, buffer) in buffers.iter().enumerate() {
            let targets = compute_targets(slot, buffer, gamma, gae_lambda)?;
            for t in buffer.transitions() {
                batch.observations.push(t.observation.clone());
                batch.actions.push(t.action);
                batch.actions_one_hot.push(one_hot(t.action, num_actions)?);
            }
            batch.returns.extend(targets.returns);
            batch.advantages.extend(targets.advantages);
        }
        Ok(batch)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Normalizes advantages to zero mean and unit variance.
    pub fn normalize_advantages(&mut self) {
        if self.advantages.is_empty() {
            return;
        }
        let mean: f64 = self.advantages.iter().sum::<f64>() / self.advantages.len() as f64;
        let var: f64 = self
            .advantages
            .iter()
            .map(|a| (a - mean).powi(2))
            .sum::<f64>()
            / self.advantages.len() as f64;
        let std = (var + 1e-8).sqrt();
        for a in &mut self.advantages {
            *a = (*a - mean) / std;
        }
    }
}

/// One-hot encodes `action` over `num_actions` entries.
pub fn one_hot(action: Action, num_actions: usize) -> Result<Vec<f64>> {
    if action >= num_actions {
        return Err(TrainError::ActionOutOfRange {
            action,
            num_actions,
        });
    }
    let mut v = vec![0.0; num_actions];
    v[action] = 1.0;
    Ok(v)
}
