//! Single-environment episodic A2C trainer.
//!
//! Runs one full episode, then flushes it as one update. Early termination
//! is penalized through [`RewardShaping`]; running to the step cap is not.

use tracing::{debug, info, warn};

use super::rollout::{Phase, Rollout};
use crate::config::{RewardShaping, TrainingConfig};
use crate::environment::Environment;
use crate::estimator::PolicyValueEstimator;
use crate::error::{Result, TrainError};
use crate::metrics::{BatchReport, RunningReward, TrainingReport};
use crate::policy::ActionSampler;

pub struct EpisodeTrainer<E, P, S> {
    env: E,
    estimator: P,
    sampler: S,
    config: TrainingConfig,
    shaping: RewardShaping,
    rollout: Rollout,
    running_reward: RunningReward,
    phase: Phase,
}

impl<E, P, S> EpisodeTrainer<E, P, S>
where
    E: Environment,
    P: PolicyValueEstimator,
    S: ActionSampler,
{
    pub fn new(
        env: E,
        estimator: P,
        sampler: S,
        config: TrainingConfig,
        shaping: RewardShaping,
    ) -> Result<Self> {
        config.validate()?;
        shaping.validate()?;
        if estimator.num_actions() != env.num_actions() {
            return Err(TrainError::ShapeMismatch {
                what: "estimator action count",
                expected: env.num_actions(),
                actual: estimator.num_actions(),
            });
        }
        let rollout = Rollout::new(1, env.observation_dim(), env.num_actions(), Some(shaping));
        Ok(Self {
            env,
            estimator,
            sampler,
            config,
            shaping,
            rollout,
            running_reward: RunningReward::new(),
            phase: Phase::Accumulating,
        })
    }

    /// Runs one episode and performs one update from it.
    ///
    /// If the environment has not terminated after `max_episode_steps`
    /// ticks, the episode is cut and flushed as a truncated rollout.
    pub fn run_episode(&mut self) -> Result<BatchReport> {
        self.rollout.reset(std::slice::from_mut(&mut self.env))?;
        self.phase = Phase::Accumulating;
        let mut report = BatchReport::default();

        loop {
            let finished = self.rollout.step_all(
                std::slice::from_mut(&mut self.env),
                &mut self.estimator,
                &mut self.sampler,
            )?;
            report.ticks += 1;
            if let Some(episode) = finished.first() {
                self.running_reward.record(episode.reward);
                break;
            }
            if report.ticks >= self.shaping.max_episode_steps {
                warn!(
                    steps = report.ticks,
                    "environment did not terminate at the step cap; truncating"
                );
                report.truncated = true;
                break;
            }
        }

        self.phase = Phase::Flushing;
        let outcome = self.rollout.flush(&mut self.estimator, &self.config)?;
        if let Some(loss) = outcome.loss {
            report.updates += 1;
            report.losses.push(loss);
            debug!(rows = outcome.rows, loss, "episode update");
        }
        self.phase = Phase::Accumulating;

        let slot = &self.rollout.slots()[0];
        report.episode_rewards.push(slot.cumulative_reward);
        report.episode_steps.push(slot.steps);
        Ok(report)
    }

    /// Runs `episodes` episodes and returns the learning curve.
    pub fn train(&mut self, episodes: u32) -> Result<TrainingReport> {
        let mut training = TrainingReport::default();
        for episode in 0..episodes {
            let report = self.run_episode()?;
            let running = self.running_reward.value().unwrap_or(0.0);
            training.push(episode, &report, running);

            if self.config.log_every > 0 && episode % self.config.log_every == 0 {
                info!(
                    episode = episode + 1,
                    steps = report.ticks,
                    reward = report.total_reward(),
                    running_reward = running,
                    "episode complete"
                );
            }
        }
        self.phase = Phase::Terminated;
        Ok(training)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn running_reward(&self) -> Option<f64> {
        self.running_reward.value()
    }

    pub fn estimator(&self) -> &P {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut P {
        &mut self.estimator
    }

    pub fn into_estimator(self) -> P {
        self.estimator
    }
}
