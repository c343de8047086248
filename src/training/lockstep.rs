//! Multi-environment lock-step A2C trainer.
//!
//! Each batch runs one episode per environment slot. Every `t_max` ticks
//! the accumulated window is flushed into one parameter update, with slots
//! still in progress bootstrapped by the estimator; once every slot is done
//! any remaining transitions are flushed a final time.

use tracing::{debug, info};

use super::rollout::{Phase, Rollout};
use crate::config::TrainingConfig;
use crate::environment::Environment;
use crate::estimator::PolicyValueEstimator;
use crate::error::{Result, TrainError};
use crate::metrics::{BatchReport, RunningReward, TrainingReport};
use crate::policy::ActionSampler;

/// Synchronous A2C over a vector of environments.
///
/// # Type Parameters
///
/// * `E` - Environment type (use `Box<dyn Environment>` to mix kinds)
/// * `P` - Policy/value estimator
/// * `S` - Action sampler
pub struct LockstepTrainer<E, P, S> {
    envs: Vec<E>,
    estimator: P,
    sampler: S,
    config: TrainingConfig,
    rollout: Rollout,
    running_reward: RunningReward,
    phase: Phase,
    batches: u32,
}

impl<E, P, S> LockstepTrainer<E, P, S>
where
    E: Environment,
    P: PolicyValueEstimator,
    S: ActionSampler,
{
    /// Creates a new trainer.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid, `envs` is empty, or the environments
    /// and estimator disagree on observation width or action count.
    pub fn new(envs: Vec<E>, estimator: P, sampler: S, config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let first = envs.first().ok_or(TrainError::NoEnvironments)?;
        let obs_dim = first.observation_dim();
        let num_actions = first.num_actions();

        for env in &envs[1..] {
            if env.observation_dim() != obs_dim {
                return Err(TrainError::ShapeMismatch {
                    what: "environment observation width",
                    expected: obs_dim,
                    actual: env.observation_dim(),
                });
            }
            if env.num_actions() != num_actions {
                return Err(TrainError::ShapeMismatch {
                    what: "environment action count",
                    expected: num_actions,
                    actual: env.num_actions(),
                });
            }
        }
        if estimator.num_actions() != num_actions {
            return Err(TrainError::ShapeMismatch {
                what: "estimator action count",
                expected: num_actions,
                actual: estimator.num_actions(),
            });
        }

        let rollout = Rollout::new(envs.len(), obs_dim, num_actions, None);
        Ok(Self {
            envs,
            estimator,
            sampler,
            config,
            rollout,
            running_reward: RunningReward::new(),
            phase: Phase::Accumulating,
            batches: 0,
        })
    }

    /// Runs one episode in every slot, updating every `t_max` ticks.
    pub fn run_batch(&mut self) -> Result<BatchReport> {
        self.rollout.reset(&mut self.envs)?;
        self.phase = Phase::Accumulating;
        let mut report = BatchReport::default();

        while !self.rollout.all_done() {
            let finished =
                self.rollout
                    .step_all(&mut self.envs, &mut self.estimator, &mut self.sampler)?;
            report.ticks += 1;
            for episode in finished {
                self.running_reward.record(episode.reward);
            }

            if self.rollout.tick() >= self.config.t_max {
                self.flush(&mut report)?;
            }
        }
        if self.rollout.pending_transitions() > 0 {
            self.flush(&mut report)?;
        }

        for slot in self.rollout.slots() {
            report.episode_rewards.push(slot.cumulative_reward);
            report.episode_steps.push(slot.steps);
        }
        self.batches += 1;
        Ok(report)
    }

    /// Runs `num_batches` batches and returns the learning curve.
    pub fn train(&mut self, num_batches: u32) -> Result<TrainingReport> {
        let mut training = TrainingReport::default();
        for batch in 0..num_batches {
            let report = self.run_batch()?;
            let running = self.running_reward.value().unwrap_or(0.0);
            training.push(batch, &report, running);

            if self.config.log_every > 0 && batch % self.config.log_every == 0 {
                info!(
                    batch,
                    episodes = (batch as usize + 1) * self.envs.len(),
                    mean_reward = report.mean_reward(),
                    running_reward = running,
                    "batch complete"
                );
            }
        }
        self.phase = Phase::Terminated;
        Ok(training)
    }

    fn flush(&mut self, report: &mut BatchReport) -> Result<()> {
        self.phase = Phase::Flushing;
        let outcome = self.rollout.flush(&mut self.estimator, &self.config)?;
        if let Some(loss) = outcome.loss {
            report.updates += 1;
            report.losses.push(loss);
            debug!(rows = outcome.rows, loss, "lockstep update");
        }
        self.phase = Phase::Accumulating;
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn running_reward(&self) -> Option<f64> {
        self.running_reward.value()
    }

    /// Batches completed so far.
    pub fn batches(&self) -> u32 {
        self.batches
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn estimator(&self) -> &P {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut P {
        &mut self.estimator
    }

    pub fn rollout(&self) -> &Rollout {
        &self.rollout
    }

    /// Consumes the trainer, returning the estimator.
    pub fn into_estimator(self) -> P {
        self.estimator
    }
}
