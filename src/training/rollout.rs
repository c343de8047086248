//! Lock-step stepping of environment slots and flushing into updates.
//!
//! All live slots advance exactly one tick before any slot advances again,
//! so a single [`PolicyValueEstimator::predict`] call serves every slot per
//! tick. A slot whose episode ends stays done, with its closed buffer kept
//! for the next flush, until the rollout is [`reset`](Rollout::reset).

use tracing::{debug, trace};

use super::batch::TrainingBatch;
use super::buffer::{RolloutBuffer, Transition};
use crate::config::{RewardShaping, TrainingConfig};
use crate::environment::{Environment, Observation};
use crate::estimator::{PolicyValueEstimator, Prediction};
use crate::error::{Result, TrainError};
use crate::policy::ActionSampler;

/// Per-slot episode state.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSlot {
    /// Current (not yet acted upon) observation.
    pub observation: Observation,
    /// Whether this slot's episode has ended.
    pub done: bool,
    /// Sum of shaped rewards this episode.
    pub cumulative_reward: f64,
    /// Steps taken this episode.
    pub steps: usize,
}

impl EpisodeSlot {
    fn new(observation: Observation) -> Self {
        Self {
            observation,
            done: false,
            cumulative_reward: 0.0,
            steps: 0,
        }
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accumulating,
    Flushing,
    Terminated,
}

/// An episode that ended during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishedEpisode {
    pub slot: usize,
    pub reward: f64,
    pub steps: usize,
}

/// Result of a flush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushOutcome {
    /// Rows in the training batch.
    pub rows: usize,
    /// Loss reported by the estimator; `None` if nothing was flushed.
    pub loss: Option<f64>,
}

/// Buffers and episode state of every environment slot.
#[derive(Debug, Clone)]
pub struct Rollout {
    slots: Vec<EpisodeSlot>,
    buffers: Vec<RolloutBuffer>,
    obs_dim: usize,
    num_actions: usize,
    shaping: Option<RewardShaping>,
    tick: usize,
}

impl Rollout {
    /// Creates a rollout over `num_slots` slots.
    ///
    /// Slots start done; call [`reset`](Self::reset) to begin episodes.
    pub fn new(
        num_slots: usize,
        obs_dim: usize,
        num_actions: usize,
        shaping: Option<RewardShaping>,
    ) -> Self {
        let idle = EpisodeSlot {
            observation: vec![0.0; obs_dim],
            done: true,
            cumulative_reward: 0.0,
            steps: 0,
        };
        Self {
            slots: vec![idle; num_slots],
            buffers: vec![RolloutBuffer::new(); num_slots],
            obs_dim,
            num_actions,
            shaping,
            tick: 0,
        }
    }

    /// Resets every environment and starts a fresh episode in each slot.
    ///
    /// Any unflushed transitions are discarded.
    pub fn reset<E: Environment>(&mut self, envs: &mut [E]) -> Result<()> {
        self.check_env_count(envs.len())?;
        for (i, env) in envs.iter_mut().enumerate() {
            let observation = env.reset()?;
            self.check_observation(i, &observation)?;
            self.slots[i] = EpisodeSlot::new(observation);
            self.buffers[i].clear();
        }
        self.tick = 0;
        Ok(())
    }

    /// Advances every live slot by one step.
    ///
    /// Calls `estimator.predict` once with the observations of all live
    /// slots, samples one action per slot and steps each environment.
    /// Terminated slots get a bootstrap of exactly `0.0`.
    ///
    /// # Returns
    ///
    /// The episodes that ended during this tick, in slot order.
    pub fn step_all<E, P, S>(
        &mut self,
        envs: &mut [E],
        estimator: &mut P,
        sampler: &mut S,
    ) -> Result<Vec<FinishedEpisode>>
    where
        E: Environment,
        P: PolicyValueEstimator + ?Sized,
        S: ActionSampler + ?Sized,
    {
        self.check_env_count(envs.len())?;
        let live: Vec<usize> = (0..self.slots.len())
            .filter(|&i| !self.slots[i].done)
            .collect();
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let observations: Vec<Observation> = live
            .iter()
            .map(|&i| self.slots[i].observation.clone())
            .collect();
        let prediction = estimator.predict(&observations)?;
        check_prediction(&prediction, live.len(), self.num_actions)?;

        let mut finished = Vec::new();
        for (row, &i) in live.iter().enumerate() {
            let action = sampler
                .sample(&prediction.action_probs[row])
                .map_err(|source| TrainError::Sampling { slot: i, source })?;
            if action >= self.num_actions {
                return Err(TrainError::ActionOutOfRange {
                    action,
                    num_actions: self.num_actions,
                });
            }

            let step = envs[i].step(action)?;
            self.check_observation(i, &step.observation)?;

            let slot = &mut self.slots[i];
            slot.steps += 1;
            let reward = match self.shaping {
                Some(shaping) => shaping.apply(step.reward, step.done, slot.steps),
                None => step.reward,
            };
            slot.cumulative_reward += reward;
            let observation = std::mem::replace(&mut slot.observation, step.observation);

            self.buffers[i].push(Transition {
                observation,
                action,
                reward,
                value: prediction.values[row],
            })?;

            if step.done {
                slot.done = true;
                self.buffers[i].close(0.0)?;
                finished.push(FinishedEpisode {
                    slot: i,
                    reward: slot.cumulative_reward,
                    steps: slot.steps,
                });
            }
        }

        self.tick += 1;
        trace!(tick = self.tick, live = live.len(), finished = finished.len(), "tick");
        Ok(finished)
    }

    /// Closes every non-empty open buffer with the estimator's value of the
    /// slot's current observation, using one batched `predict` call.
    pub fn bootstrap<P>(&mut self, estimator: &mut P) -> Result<()>
    where
        P: PolicyValueEstimator + ?Sized,
    {
        let open: Vec<usize> = (0..self.buffers.len())
            .filter(|&i| !self.buffers[i].is_empty() && !self.buffers[i].is_closed())
            .collect();
        if open.is_empty() {
            return Ok(());
        }

        let observations: Vec<Observation> = open
            .iter()
            .map(|&i| self.slots[i].observation.clone())
            .collect();
        let prediction = estimator.predict(&observations)?;
        if prediction.values.len() != open.len() {
            return Err(TrainError::ShapeMismatch {
                what: "bootstrap value batch",
                expected: open.len(),
                actual: prediction.values.len(),
            });
        }
        for (row, &i) in open.iter().enumerate() {
            self.buffers[i].close(prediction.values[row])?;
        }
        Ok(())
    }

    /// Bootstraps open buffers, builds one training batch from every slot
    /// and calls `estimator.update` once.
    ///
    /// A flush with no pending transitions is a no-op. Buffers are cleared
    /// and the tick counter resets either way.
    pub fn flush<P>(&mut self, estimator: &mut P, config: &TrainingConfig) -> Result<FlushOutcome>
    where
        P: PolicyValueEstimator + ?Sized,
    {
        if self.pending_transitions() == 0 {
            self.tick = 0;
            return Ok(FlushOutcome {
                rows: 0,
                loss: None,
            });
        }

        self.bootstrap(estimator)?;
        let mut batch = TrainingBatch::from_buffers(
            &self.buffers,
            self.num_actions,
            config.gamma,
            config.gae_lambda,
        )?;
        if config.normalize_advantages {
            batch.normalize_advantages();
        }
        let loss = estimator.update(&batch)?;
        debug!(rows = batch.len(), loss, "flushed rollout");

        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.tick = 0;
        Ok(FlushOutcome {
            rows: batch.len(),
            loss: Some(loss),
        })
    }

    /// Ticks since the last flush or reset.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn all_done(&self) -> bool {
        self.slots.iter().all(|s| s.done)
    }

    /// Transitions buffered across all slots.
    pub fn pending_transitions(&self) -> usize {
        self.buffers.iter().map(RolloutBuffer::len).sum()
    }

    pub fn slots(&self) -> &[EpisodeSlot] {
        &self.slots
    }

    pub fn buffers(&self) -> &[RolloutBuffer] {
        &self.buffers
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    fn check_env_count(&self, envs: usize) -> Result<()> {
        if envs != self.slots.len() {
            return Err(TrainError::ShapeMismatch {
                what: "environment count",
                expected: self.slots.len(),
                actual: envs,
            });
        }
        Ok(())
    }

    fn check_observation(&self, slot: usize, observation: &[f64]) -> Result<()> {
        if observation.len() != self.obs_dim {
            return Err(TrainError::ObservationShape {
                slot,
                expected: self.obs_dim,
                actual: observation.len(),
            });
        }
        Ok(())
    }
}

/// Checks that a prediction has `rows` rows of `num_actions` probabilities.
pub(crate) fn check_prediction(
    prediction: &Prediction,
    rows: usize,
    num_actions: usize,
) -> Result<()> {
    if prediction.action_probs.len() != rows {
        return Err(TrainError::ShapeMismatch {
            what: "action probability batch",
            expected: rows,
            actual: prediction.action_probs.len(),
        });
    }
    if prediction.values.len() != rows {
        return Err(TrainError::ShapeMismatch {
            what: "value batch",
            expected: rows,
            actual: prediction.values.len(),
        });
    }
    if let Some(row) = prediction
        .action_probs
        .iter()
        .find(|row| row.len() != num_actions)
    {
        return Err(TrainError::ShapeMismatch {
            what: "action probability row",
            expected: num_actions,
            actual: row.len(),
        });
    }
    Ok(())
}
