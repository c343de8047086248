//! Environment contract consumed by the rollout layer.
//!
//! An environment wraps one simulated episode source with a fixed
//! observation width and a finite discrete action space.
//!
//! # Lifecycle
//!
//! 1. Call [`Environment::reset`] to begin an episode.
//! 2. Repeatedly call [`Environment::step`] until the returned
//!    [`StepResult::done`] is `true`.
//! 3. Call [`Environment::reset`] again before the next episode.

use crate::error::EnvError;

/// A fixed-width observation vector.
pub type Observation = Vec<f64>;

/// Index into a discrete action space.
pub type Action = usize;

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Observation after the step.
    pub observation: Observation,
    /// Raw reward reported by the environment.
    pub reward: f64,
    /// Whether the episode ended with this step.
    pub done: bool,
}

/// A simulated environment stepped by the trainers.
///
/// `observation_dim` and `num_actions` must stay constant for the lifetime
/// of a training run.
pub trait Environment {
    /// Width of every observation this environment produces.
    fn observation_dim(&self) -> usize;

    /// Size of the discrete action space.
    fn num_actions(&self) -> usize;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Observation, EnvError>;

    /// Advances the episode by one step.
    fn step(&mut self, action: Action) -> Result<StepResult, EnvError>;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn observation_dim(&self) -> usize {
        (**self).observation_dim()
    }

    fn num_actions(&self) -> usize {
        (**self).num_actions()
    }

    fn reset(&mut self) -> Result<Observation, EnvError> {
        (**self).reset()
    }

    fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        (**self).step(action)
    }
}
