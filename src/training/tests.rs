//! Scheduler-level test suite for the rollout and training loops.

use super::*;
use crate::config::{ActorCriticConfig, BanditConfig, RewardShaping, TrainingConfig};
use crate::environment::{Action, Environment, Observation, StepResult};
use crate::error::{EnvError, EstimatorError, TrainError};
use crate::estimator::{LinearActorCritic, PolicyValueEstimator, Prediction};
use crate::policy::{GreedySampler, MultinomialSampler};
use crate::vocab::LabelledCorpus;

const GAMMA: f64 = 0.99;

/// Observation `[t]`, reward 1.0 per step, done after `horizon` steps.
struct Countdown {
    horizon: usize,
    t: usize,
}

impl Countdown {
    fn new(horizon: usize) -> Self {
        Self { horizon, t: 0 }
    }
}

impl Environment for Countdown {
    fn observation_dim(&self) -> usize {
        1
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Observation, EnvError> {
        self.t = 0;
        Ok(vec![0.0])
    }

    fn step(&mut self, _action: Action) -> Result<StepResult, EnvError> {
        if self.t >= self.horizon {
            return Err(EnvError::EpisodeFinished);
        }
        self.t += 1;
        Ok(StepResult {
            observation: vec![self.t as f64],
            reward: 1.0,
            done: self.t >= self.horizon,
        })
    }
}

/// Deterministic estimator: fixed probabilities, `value = base + slope * obs[0]`.
struct Scripted {
    num_actions: usize,
    probs: Vec<f64>,
    base: f64,
    slope: f64,
    drop_row: bool,
    fail_update: bool,
    predict_calls: Vec<usize>,
    batches: Vec<TrainingBatch>,
}

impl Scripted {
    fn new(base: f64, slope: f64) -> Self {
        Self {
            num_actions: 2,
            probs: vec![1.0, 0.0],
            base,
            slope,
            drop_row: false,
            fail_update: false,
            predict_calls: Vec::new(),
            batches: Vec::new(),
        }
    }

    fn value_of(&self, t: f64) -> f64 {
        self.base + self.slope * t
    }
}

impl PolicyValueEstimator for Scripted {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn predict(&mut self, observations: &[Observation]) -> Result<Prediction, EstimatorError> {
        self.predict_calls.push(observations.len());
        let mut rows: Vec<&Observation> = observations.iter().collect();
        if self.drop_row {
            rows.pop();
        }
        Ok(Prediction {
            action_probs: rows.iter().map(|_| self.probs.clone()).collect(),
            values: rows.iter().map(|o| self.value_of(o[0])).collect(),
        })
    }

    fn update(&mut self, batch: &TrainingBatch) -> Result<f64, EstimatorError> {
        if self.fail_update {
            return Err(EstimatorError::Backend("optimizer diverged".into()));
        }
        self.batches.push(batch.clone());
        Ok(batch.len() as f64)
    }
}

fn config(t_max: usize) -> TrainingConfig {
    TrainingConfig {
        gamma: GAMMA,
        gae_lambda: 1.0,
        t_max,
        log_every: 0,
        ..TrainingConfig::default()
    }
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

mod rollout_core {
    use super::*;

    #[test]
    fn truncated_window_worked_example() {
        let mut envs = vec![Countdown::new(10)];
        let mut est = Scripted::new(0.2, 0.1);
        let mut rollout = Rollout::new(1, 1, 2, None);
        rollout.reset(&mut envs).unwrap();

        for _ in 0..3 {
            rollout
                .step_all(&mut envs, &mut est, &mut GreedySampler)
                .unwrap();
        }
        assert_eq!(rollout.tick(), 3);
        let outcome = rollout.flush(&mut est, &config(3)).unwrap();
        assert_eq!(outcome.rows, 3);
        assert_eq!(outcome.loss, Some(3.0));
        assert_eq!(rollout.tick(), 0);
        assert_eq!(rollout.pending_transitions(), 0);

        // Three ticks, then one bootstrap call on observation [3].
        assert_eq!(est.predict_calls, vec![1, 1, 1, 1]);
        let batch = &est.batches[0];
        assert_eq!(batch.observations, vec![vec![0.0], vec![1.0], vec![2.0]]);
        assert_close(&batch.returns, &[3.4552495, 2.48005, 1.495]);
        assert_close(&batch.advantages, &[3.2552495, 2.18005, 1.095]);
    }

    #[test]
    fn natural_termination_bootstraps_zero() {
        let mut envs = vec![Countdown::new(2)];
        let mut est = Scripted::new(5.0, 0.0);
        let mut rollout = Rollout::new(1, 1, 2, None);
        rollout.reset(&mut envs).unwrap();

        rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap();
        let finished = rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].reward, 2.0);
        assert!(rollout.all_done());

        let buffer = &rollout.buffers()[0];
        assert_eq!(buffer.bootstrap(), Some(0.0));
        assert_eq!(buffer.values().len(), buffer.rewards().len() + 1);

        rollout.flush(&mut est, &config(50)).unwrap();
        // No bootstrap prediction for a terminated slot.
        assert_eq!(est.predict_calls, vec![1, 1]);
        assert_close(&est.batches[0].returns, &[1.0 + GAMMA, 1.0]);
    }

    #[test]
    fn open_buffer_bootstraps_with_estimator_value() {
        let mut envs = vec![Countdown::new(10), Countdown::new(1)];
        let mut est = Scripted::new(0.2, 0.1);
        let mut rollout = Rollout::new(2, 1, 2, None);
        rollout.reset(&mut envs).unwrap();
        rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap();
        rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap();

        rollout.bootstrap(&mut est).unwrap();
        let open = &rollout.buffers()[0];
        assert!((open.bootstrap().unwrap() - est.value_of(2.0)).abs() < 1e-12);
        assert_eq!(rollout.buffers()[1].bootstrap(), Some(0.0));
        for buffer in rollout.buffers() {
            assert_eq!(buffer.values().len(), buffer.rewards().len() + 1);
        }
        // Only the open slot is queried.
        assert_eq!(est.predict_calls.last(), Some(&1));
    }

    #[test]
    fn empty_flush_is_noop() {
        let mut envs = vec![Countdown::new(3), Countdown::new(3)];
        let mut est = Scripted::new(0.0, 0.0);
        let mut rollout = Rollout::new(2, 1, 2, None);
        rollout.reset(&mut envs).unwrap();

        let outcome = rollout.flush(&mut est, &config(5)).unwrap();
        assert_eq!(outcome.rows, 0);
        assert_eq!(outcome.loss, None);
        assert!(est.batches.is_empty());
        assert!(est.predict_calls.is_empty());
    }

    #[test]
    fn short_prediction_is_fatal() {
        let mut envs = vec![Countdown::new(3), Countdown::new(3)];
        let mut est = Scripted::new(0.0, 0.0);
        est.drop_row = true;
        let mut rollout = Rollout::new(2, 1, 2, None);
        rollout.reset(&mut envs).unwrap();

        let err = rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainError::ShapeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn invalid_probabilities_are_not_masked() {
        let mut envs = vec![Countdown::new(3)];
        let mut est = Scripted::new(0.0, 0.0);
        est.probs = vec![0.7, 0.7];
        let mut rollout = Rollout::new(1, 1, 2, None);
        rollout.reset(&mut envs).unwrap();

        let err = rollout
            .step_all(&mut envs, &mut est, &mut MultinomialSampler::seeded(1))
            .unwrap_err();
        assert!(matches!(err, TrainError::Sampling { slot: 0, .. }));
    }

    #[test]
    fn malformed_observation_is_fatal() {
        struct Misshapen;
        impl Environment for Misshapen {
            fn observation_dim(&self) -> usize {
                1
            }
            fn num_actions(&self) -> usize {
                2
            }
            fn reset(&mut self) -> Result<Observation, EnvError> {
                Ok(vec![0.0])
            }
            fn step(&mut self, _action: Action) -> Result<StepResult, EnvError> {
                Ok(StepResult {
                    observation: vec![0.0, 0.0],
                    reward: 0.0,
                    done: false,
                })
            }
        }

        let mut envs = vec![Misshapen];
        let mut est = Scripted::new(0.0, 0.0);
        let mut rollout = Rollout::new(1, 1, 2, None);
        rollout.reset(&mut envs).unwrap();
        let err = rollout
            .step_all(&mut envs, &mut est, &mut GreedySampler)
            .unwrap_err();
        assert!(matches!(
            err,
            TrainError::ObservationShape {
                slot: 0,
                expected: 1,
                actual: 2
            }
        ));
    }
}

mod lockstep {
    use super::*;

    #[test]
    fn one_predict_per_tick_across_slots() {
        let envs = vec![
            Countdown::new(3),
            Countdown::new(5),
            Countdown::new(5),
            Countdown::new(7),
        ];
        let est = Scripted::new(0.0, 0.0);
        let mut trainer = LockstepTrainer::new(envs, est, GreedySampler, config(100)).unwrap();

        let report = trainer.run_batch().unwrap();
        assert_eq!(report.ticks, 7);
        assert_eq!(report.updates, 1);
        assert_eq!(report.episode_rewards, vec![3.0, 5.0, 5.0, 7.0]);
        assert_eq!(report.episode_steps, vec![3, 5, 5, 7]);

        let est = trainer.estimator();
        assert_eq!(est.predict_calls, vec![4, 4, 4, 3, 3, 1, 1]);
        assert_eq!(est.batches.len(), 1);
        assert_eq!(est.batches[0].len(), 20);
    }

    #[test]
    fn flushes_at_t_max_and_once_more_at_completion() {
        let envs = vec![Countdown::new(2), Countdown::new(6)];
        let est = Scripted::new(0.2, 0.1);
        let mut trainer = LockstepTrainer::new(envs, est, GreedySampler, config(4)).unwrap();

        let report = trainer.run_batch().unwrap();
        assert_eq!(report.updates, 2);
        assert_eq!(report.losses, vec![6.0, 2.0]);

        let est = trainer.estimator();
        // Ticks 1-2 both slots, 3-4 one slot, bootstrap, ticks 5-6.
        assert_eq!(est.predict_calls, vec![2, 2, 1, 1, 1, 1, 1]);

        let first = &est.batches[0];
        assert_eq!(first.len(), 6);
        // Slot 0 terminated inside the window.
        assert_close(&first.returns[..2], &[1.0 + GAMMA, 1.0]);
        // Slot 1 was cut at observation [4].
        let bootstrap = est.value_of(4.0);
        assert!((first.returns[5] - (1.0 + GAMMA * bootstrap)).abs() < 1e-12);

        let second = &est.batches[1];
        assert_eq!(second.observations, vec![vec![4.0], vec![5.0]]);
        assert_close(&second.returns, &[1.0 + GAMMA, 1.0]);
    }

    #[test]
    fn every_batch_aligns_returns_and_advantages() {
        let envs = vec![Countdown::new(5), Countdown::new(8), Countdown::new(1)];
        let est = Scripted::new(0.5, -0.05);
        let mut trainer = LockstepTrainer::new(envs, est, GreedySampler, config(3)).unwrap();
        trainer.run_batch().unwrap();

        let est = trainer.estimator();
        let rows: usize = est.batches.iter().map(TrainingBatch::len).sum();
        assert_eq!(rows, 5 + 8 + 1);
        for batch in &est.batches {
            assert_eq!(batch.returns.len(), batch.len());
            assert_eq!(batch.advantages.len(), batch.len());
            assert_eq!(batch.actions_one_hot.len(), batch.len());
        }
    }

    #[test]
    fn train_reaches_terminated() {
        let envs = vec![Countdown::new(3), Countdown::new(3)];
        let est = Scripted::new(0.0, 0.0);
        let mut trainer = LockstepTrainer::new(envs, est, GreedySampler, config(2)).unwrap();
        assert_eq!(trainer.phase(), Phase::Accumulating);

        let report = trainer.train(4).unwrap();
        assert_eq!(trainer.phase(), Phase::Terminated);
        assert_eq!(trainer.batches(), 4);
        assert_eq!(report.curve.len(), 4);
        assert_eq!(report.episodes, 8);
        assert_eq!(report.updates, 8);
        assert_eq!(trainer.running_reward(), Some(3.0));
    }

    #[test]
    fn update_failure_aborts() {
        let envs = vec![Countdown::new(3)];
        let mut est = Scripted::new(0.0, 0.0);
        est.fail_update = true;
        let mut trainer = LockstepTrainer::new(envs, est, GreedySampler, config(2)).unwrap();
        assert!(matches!(
            trainer.run_batch(),
            Err(TrainError::Estimator(EstimatorError::Backend(_)))
        ));
    }

    #[test]
    fn construction_checks_shapes() {
        let empty: Vec<Countdown> = Vec::new();
        assert!(matches!(
            LockstepTrainer::new(empty, Scripted::new(0.0, 0.0), GreedySampler, config(2)),
            Err(TrainError::NoEnvironments)
        ));

        let mut wide = Scripted::new(0.0, 0.0);
        wide.num_actions = 3;
        assert!(matches!(
            LockstepTrainer::new(vec![Countdown::new(1)], wide, GreedySampler, config(2)),
            Err(TrainError::ShapeMismatch { expected: 2, actual: 3, .. })
        ));

        assert!(matches!(
            LockstepTrainer::new(
                vec![Countdown::new(1)],
                Scripted::new(0.0, 0.0),
                GreedySampler,
                config(0)
            ),
            Err(TrainError::Config(_))
        ));
    }

    #[test]
    fn linear_estimator_learns_rewarding_action() {
        /// Action 1 pays 1.0, action 0 pays nothing; five steps per episode.
        struct TwoArm {
            t: usize,
        }
        impl Environment for TwoArm {
            fn observation_dim(&self) -> usize {
                1
            }
            fn num_actions(&self) -> usize {
                2
            }
            fn reset(&mut self) -> Result<Observation, EnvError> {
                self.t = 0;
                Ok(vec![1.0])
            }
            fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
                self.t += 1;
                Ok(StepResult {
                    observation: vec![1.0],
                    reward: action as f64,
                    done: self.t >= 5,
                })
            }
        }

        let envs: Vec<TwoArm> = (0..4).map(|_| TwoArm { t: 0 }).collect();
        let est = LinearActorCritic::new(
            1,
            2,
            ActorCriticConfig {
                learning_rate: 0.1,
                ..ActorCriticConfig::default()
            },
        )
        .unwrap();
        let mut trainer =
            LockstepTrainer::new(envs, est, MultinomialSampler::seeded(21), config(3)).unwrap();
        trainer.train(150).unwrap();

        let probs = trainer
            .estimator_mut()
            .predict(&[vec![1.0]])
            .unwrap()
            .action_probs
            .remove(0);
        assert!(probs[1] > 0.8, "probs = {probs:?}");
    }
}

mod episodic {
    use super::*;

    fn trainer(horizon: usize, cap: usize) -> EpisodeTrainer<Countdown, Scripted, GreedySampler> {
        EpisodeTrainer::new(
            Countdown::new(horizon),
            Scripted::new(0.0, 0.0),
            GreedySampler,
            config(50),
            RewardShaping {
                max_episode_steps: cap,
                failure_penalty: -100.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn episode_at_cap_keeps_terminal_reward() {
        let mut trainer = trainer(500, 500);
        let report = trainer.run_episode().unwrap();
        assert!(!report.truncated);
        assert_eq!(report.episode_steps, vec![500]);
        assert_eq!(report.episode_rewards, vec![500.0]);
        assert_eq!(report.updates, 1);

        let batch = &trainer.estimator().batches[0];
        assert_eq!(batch.len(), 500);
        assert_eq!(batch.returns[499], 1.0);
    }

    #[test]
    fn early_termination_is_penalized() {
        let mut trainer = trainer(499, 500);
        let report = trainer.run_episode().unwrap();
        assert_eq!(report.episode_steps, vec![499]);
        assert_eq!(report.episode_rewards, vec![498.0 - 100.0]);
        assert_eq!(trainer.running_reward(), Some(398.0));

        let batch = &trainer.estimator().batches[0];
        assert_eq!(batch.returns[498], -100.0);
        assert!((batch.returns[497] - (1.0 - GAMMA * 100.0)).abs() < 1e-12);
    }

    #[test]
    fn flushes_only_at_episode_end() {
        let mut trainer = trainer(20, 500);
        let report = trainer.train(3).unwrap();
        assert_eq!(report.updates, 3);
        assert_eq!(trainer.phase(), Phase::Terminated);
        // One predict per tick, no bootstrap calls.
        assert_eq!(trainer.estimator().predict_calls.len(), 60);
        assert!(trainer
            .estimator()
            .batches
            .iter()
            .all(|b| b.len() == 20));
    }

    #[test]
    fn runaway_episode_is_truncated_at_cap() {
        let mut trainer = trainer(usize::MAX, 10);
        let report = trainer.run_episode().unwrap();
        assert!(report.truncated);
        assert_eq!(trainer.running_reward(), None);

        let est = trainer.estimator();
        assert_eq!(est.predict_calls.len(), 11);
        let batch = &est.batches[0];
        assert_eq!(batch.len(), 10);
        assert!((batch.returns[9] - (1.0 + GAMMA * est.value_of(10.0))).abs() < 1e-12);
    }
}

mod label_bandit {
    use super::*;

    fn corpus() -> LabelledCorpus {
        LabelledCorpus::new(vec![vec![0.0], vec![1.0]], vec![vec![0], vec![1]]).unwrap()
    }

    fn bandit(batch_size: usize) -> BanditConfig {
        BanditConfig {
            batch_size,
            seed: 5,
            ..BanditConfig::default()
        }
    }

    #[test]
    fn rewards_match_labels() {
        let mut trainer = LabelBanditTrainer::new(
            corpus(),
            Scripted::new(0.25, 0.0),
            GreedySampler,
            config(1),
            bandit(16),
        )
        .unwrap();
        let report = trainer.run_batch().unwrap();
        assert_eq!(report.episode_rewards.len(), 16);
        assert_eq!(report.updates, 1);

        let est = trainer.estimator();
        assert_eq!(est.predict_calls, vec![16]);
        let batch = &est.batches[0];
        assert_eq!(batch.len(), 16);
        for i in 0..batch.len() {
            // Greedy always picks action 0, which is only right for example 0.
            let expected = if batch.observations[i][0] == 0.0 { 1.0 } else { 0.0 };
            assert_eq!(batch.returns[i], expected);
            assert!((batch.advantages[i] - (expected - 0.25)).abs() < 1e-12);
        }
    }

    #[test]
    fn evaluate_reports_accuracy() {
        let mut trainer = LabelBanditTrainer::new(
            corpus(),
            Scripted::new(0.0, 0.0),
            GreedySampler,
            config(1),
            bandit(4),
        )
        .unwrap();
        assert_eq!(trainer.evaluate(&corpus()).unwrap(), 0.5);
    }

    #[test]
    fn labels_outside_action_space_rejected() {
        let corpus = LabelledCorpus::new(vec![vec![0.0]], vec![vec![2]]).unwrap();
        assert!(matches!(
            LabelBanditTrainer::new(
                corpus,
                Scripted::new(0.0, 0.0),
                GreedySampler,
                config(1),
                bandit(4)
            ),
            Err(TrainError::ActionOutOfRange { action: 2, .. })
        ));
    }

    #[test]
    fn linear_estimator_fits_labels() {
        let corpus =
            LabelledCorpus::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![vec![0], vec![1]])
                .unwrap();
        let est = LinearActorCritic::new(
            2,
            2,
            ActorCriticConfig {
                learning_rate: 0.5,
                ..ActorCriticConfig::default()
            },
        )
        .unwrap();
        let mut trainer = LabelBanditTrainer::new(
            corpus.clone(),
            est,
            MultinomialSampler::seeded(21),
            config(1),
            bandit(32),
        )
        .unwrap();
        let report = trainer.train(300).unwrap();
        assert_eq!(report.curve.len(), 300);
        assert_eq!(trainer.evaluate(&corpus).unwrap(), 1.0);
        assert!(trainer.running_reward().unwrap() > 0.5);
    }
}
