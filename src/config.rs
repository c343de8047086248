//! Configuration for rollouts, reward shaping and the reference estimators.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration values, reported by the `validate` methods.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("discount factor gamma must lie in (0, 1], got {0}")]
    Gamma(f64),

    #[error("GAE lambda must lie in [0, 1], got {0}")]
    Lambda(f64),

    #[error("t_max must be at least 1")]
    ZeroTMax,

    #[error("max_episode_steps must be at least 1")]
    ZeroEpisodeCap,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("learning rate must be positive and finite, got {0}")]
    LearningRate(f64),

    #[error("{name} must be finite and non-negative, got {value}")]
    Coefficient { name: &'static str, value: f64 },
}

/// Rollout and advantage hyperparameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainingConfig {
    /// Discount factor γ.
    pub gamma: f64,
    /// GAE λ parameter (0 = TD(0), 1 = Monte Carlo).
    pub gae_lambda: f64,
    /// Ticks accumulated before a truncated-rollout update.
    pub t_max: usize,
    /// Normalize advantages to zero mean and unit variance before each update.
    pub normalize_advantages: bool,
    /// Emit an `info` log line every `log_every` batches (0 disables).
    pub log_every: u32,
}

impl TrainingConfig {
    /// Checks every field against its admissible range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(ConfigError::Gamma(self.gamma));
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(ConfigError::Lambda(self.gae_lambda));
        }
        if self.t_max == 0 {
            return Err(ConfigError::ZeroTMax);
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            gae_lambda: 1.0,
            t_max: 50,
            normalize_advantages: false,
            log_every: 10,
        }
    }
}

/// Terminal reward override for the single-environment trainer.
///
/// An episode that ends before `max_episode_steps` is a failure and its
/// final reward is replaced by `failure_penalty`. An episode that runs to
/// the cap keeps its reward.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RewardShaping {
    /// Step cap of the environment's episodes.
    pub max_episode_steps: usize,
    /// Reward substituted on early termination.
    pub failure_penalty: f64,
}

impl RewardShaping {
    /// Returns the reward to record for a step.
    ///
    /// # Arguments
    ///
    /// * `reward` - Raw reward reported by the environment
    /// * `done` - Whether the step ended the episode
    /// * `episode_len` - Number of steps taken so far, including this one
    pub fn apply(&self, reward: f64, done: bool, episode_len: usize) -> f64 {
        if done && episode_len != self.max_episode_steps {
            self.failure_penalty
        } else {
            reward
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_episode_steps == 0 {
            return Err(ConfigError::ZeroEpisodeCap);
        }
        Ok(())
    }
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            max_episode_steps: 500,
            failure_penalty: -100.0,
        }
    }
}

/// Settings for the supervised-label bandit trainer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BanditConfig {
    /// Examples resampled per batch; one environment slot each.
    pub batch_size: usize,
    /// Reward any label in an example's label set, not only the first.
    pub accept_any_label: bool,
    /// Seed for example resampling.
    pub seed: u64,
}

impl BanditConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            accept_any_label: false,
            seed: 21,
        }
    }
}

/// Loss weights and step size of the reference actor-critic estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActorCriticConfig {
    pub learning_rate: f64,
    /// Weight of the critic's squared-error term.
    pub critic_coef: f64,
    /// Weight of the entropy bonus.
    pub entropy_coef: f64,
}

impl ActorCriticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::LearningRate(self.learning_rate));
        }
        for (name, value) in [
            ("critic_coef", self.critic_coef),
            ("entropy_coef", self.entropy_coef),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Coefficient { name, value });
            }
        }
        Ok(())
    }
}

impl Default for ActorCriticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            critic_coef: 0.5,
            entropy_coef: 0.01,
        }
    }
}
