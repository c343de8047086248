//! Supervised labels trained as one-step episodes.
//!
//! Each batch resamples `batch_size` labelled examples. Every example is an
//! environment slot whose episode lasts one step: the sampled action earns
//! 1.0 if it matches the example's label, otherwise 0.0, and the buffer is
//! closed with a terminal bootstrap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::batch::TrainingBatch;
use super::buffer::{RolloutBuffer, Transition};
use super::rollout::{check_prediction, Phase};
use crate::config::{BanditConfig, TrainingConfig};
use crate::environment::Observation;
use crate::estimator::PolicyValueEstimator;
use crate::error::{Result, TrainError};
use crate::metrics::{BatchReport, RunningReward, TrainingReport};
use crate::policy::{ActionSampler, GreedySampler};
use crate::vocab::LabelledCorpus;

pub struct LabelBanditTrainer<P, S> {
    corpus: LabelledCorpus,
    estimator: P,
    sampler: S,
    config: TrainingConfig,
    bandit: BanditConfig,
    rng: StdRng,
    running_reward: RunningReward,
    phase: Phase,
}

impl<P, S> LabelBanditTrainer<P, S>
where
    P: PolicyValueEstimator,
    S: ActionSampler,
{
    pub fn new(
        corpus: LabelledCorpus,
        estimator: P,
        sampler: S,
        config: TrainingConfig,
        bandit: BanditConfig,
    ) -> Result<Self> {
        config.validate()?;
        bandit.validate()?;
        let num_actions = estimator.num_actions();
        for index in 0..corpus.len() {
            if let Some(&label) = corpus.labels(index).iter().find(|&&l| l >= num_actions) {
                return Err(TrainError::ActionOutOfRange {
                    action: label,
                    num_actions,
                });
            }
        }
        Ok(Self {
            corpus,
            estimator,
            sampler,
            config,
            rng: StdRng::seed_from_u64(bandit.seed),
            bandit,
            running_reward: RunningReward::new(),
            phase: Phase::Accumulating,
        })
    }

    /// Resamples a batch of examples, acts once on each and updates once.
    pub fn run_batch(&mut self) -> Result<BatchReport> {
        self.phase = Phase::Accumulating;
        let indices: Vec<usize> = (0..self.bandit.batch_size)
            .map(|_| self.rng.gen_range(0..self.corpus.len()))
            .collect();
        let observations: Vec<Observation> = indices
            .iter()
            .map(|&i| self.corpus.observation(i).clone())
            .collect();

        let num_actions = self.estimator.num_actions();
        let prediction = self.estimator.predict(&observations)?;
        check_prediction(&prediction, indices.len(), num_actions)?;

        let mut report = BatchReport {
            ticks: 1,
            ..BatchReport::default()
        };
        let mut buffers = Vec::with_capacity(indices.len());
        for (slot, (&example, observation)) in indices.iter().zip(observations).enumerate() {
            let action = self
                .sampler
                .sample(&prediction.action_probs[slot])
                .map_err(|source| TrainError::Sampling { slot, source })?;
            let reward = if self
                .corpus
                .accepts(example, action, self.bandit.accept_any_label)
            {
                1.0
            } else {
                0.0
            };

            let mut buffer = RolloutBuffer::new();
            buffer.push(Transition {
                observation,
                action,
                reward,
                value: prediction.values[slot],
            })?;
            buffer.close(0.0)?;
            buffers.push(buffer);

            self.running_reward.record(reward);
            report.episode_rewards.push(reward);
            report.episode_steps.push(1);
        }

        self.phase = Phase::Flushing;
        let mut batch = TrainingBatch::from_buffers(
            &buffers,
            num_actions,
            self.config.gamma,
            self.config.gae_lambda,
        )?;
        if self.config.normalize_advantages {
            batch.normalize_advantages();
        }
        let loss = self.estimator.update(&batch)?;
        report.updates = 1;
        report.losses.push(loss);
        self.phase = Phase::Accumulating;
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
                    episodes = (batch as usize + 1) * self.bandit.batch_size,
                    total_reward = report.total_reward(),
                    running_reward = running,
                    "bandit batch complete"
                );
            }
        }
        self.phase = Phase::Terminated;
        Ok(training)
    }

    /// Fraction of `corpus` examples whose arg-max action is accepted.
    pub fn evaluate(&mut self, corpus: &LabelledCorpus) -> Result<f64> {
        let observations: Vec<Observation> =
            (0..corpus.len()).map(|i| corpus.observation(i).clone()).collect();
        let prediction = self.estimator.predict(&observations)?;
        check_prediction(&prediction, corpus.len(), self.estimator.num_actions())?;

        let mut greedy = GreedySampler;
        let mut correct = 0usize;
        for (index, probs) in prediction.action_probs.iter().enumerate() {
            let action = greedy
                .sample(probs)
                .map_err(|source| TrainError::Sampling {
                    slot: index,
                    source,
                })?;
            if corpus.accepts(index, action, self.bandit.accept_any_label) {
                correct += 1;
            }
        }
        Ok(correct as f64 / corpus.len() as f64)
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

    pub fn into_estimator(self) -> P {
        self.estimator
    }
}
