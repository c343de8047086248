//! Discounted returns and Generalized Advantage Estimation (GAE-λ).
//!
//! Every quantity here is built on [`discount`], the reverse discounted
//! cumulative sum. Returns are bootstrapped by appending the bootstrap value
//! as a pseudo-reward one step past the window and dropping its entry.

use super::buffer::RolloutBuffer;
use crate::error::{Result, TrainError};

/// Discounted returns and advantages for one slot, aligned with its transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTargets {
    pub returns: Vec<f64>,
    pub advantages: Vec<f64>,
}

impl SlotTargets {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// For each position `t`, sums `factor^k * x[t + k]` to the end of `x`.
///
/// Computed with the reverse scan `acc = x[t] + factor * acc`.
pub fn discount(x: &[f64], factor: f64) -> Vec<f64> {
    let mut out = vec![0.0; x.len()];
    let mut acc = 0.0;
    for t in (0..x.len()).rev() {
        acc = x[t] + factor * acc;
        out[t] = acc;
    }
    out
}

/// Discounted return of every step, bootstrapped past the last step.
pub fn discounted_returns(rewards: &[f64], bootstrap: f64, gamma: f64) -> Vec<f64> {
    if rewards.is_empty() {
        return Vec::new();
    }
    let mut extended = Vec::with_capacity(rewards.len() + 1);
    extended.extend_from_slice(rewards);
    extended.push(bootstrap);

    let mut returns = discount(&extended, gamma);
    returns.pop();
    returns
}

/// One-step TD residuals `δ_t = r_t + γ v_{t+1} − v_t`.
///
/// # Panics
///
/// Panics unless `values.len() == rewards.len() + 1`.
pub fn td_residuals(rewards: &[f64], values: &[f64], gamma: f64) -> Vec<f64> {
    assert_eq!(values.len(), rewards.len() + 1);
    rewards
        .iter()
        .enumerate()
        .map(|(t, r)| r + gamma * values[t + 1] - values[t])
        .collect()
}

/// GAE-λ advantages: the residuals discounted by `γλ`.
///
/// # Panics
///
/// Panics unless `values.len() == rewards.len() + 1`.
pub fn gae_advantages(rewards: &[f64], values: &[f64], gamma: f64, gae_lambda: f64) -> Vec<f64> {
    let deltas = td_residuals(rewards, values, gamma);
    discount(&deltas, gamma * gae_lambda)
}

/// Computes returns and advantages from one slot's buffer.
///
/// # Arguments
///
/// * `slot` - Slot index, used for error reporting
/// * `buffer` - The slot's buffer; must be closed unless empty
/// * `gamma` - Discount factor
/// * `gae_lambda` - GAE λ parameter
pub fn compute_targets(
    slot: usize,
    buffer: &RolloutBuffer,
    gamma: f64,
    gae_lambda: f64,
) -> Result<SlotTargets> {
    if buffer.is_empty() {
        return Ok(SlotTargets::default());
    }
    let bootstrap = buffer
        .bootstrap()
        .ok_or(TrainError::MissingBootstrap { slot })?;

    let rewards = buffer.rewards();
    let values = buffer.values();
    Ok(SlotTargets {
        returns: discounted_returns(&rewards, bootstrap, gamma),
        advantages: gae_advantages(&rewards, &values, gamma, gae_lambda),
    })
}
