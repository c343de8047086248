//! lockstep_a2c - synchronous advantage actor-critic over lock-stepped environments
//!
//! Steps several environments one tick at a time with a single batched
//! estimator call per tick, buffers per-environment trajectories, computes
//! bootstrapped discounted returns and GAE advantages, and flushes them into
//! batched parameter updates.
//!
//! The neural network (`nn` feature) and serde support (`serde` feature) are
//! optional.

pub mod config;
pub mod environment;
pub mod error;
pub mod estimator;
pub mod metrics;
pub mod policy;
pub mod training;
pub mod vocab;

pub use config::{ActorCriticConfig, BanditConfig, ConfigError, RewardShaping, TrainingConfig};
pub use environment::{Action, Environment, Observation, StepResult};
pub use error::{EnvError, EstimatorError, Result, TrainError};
pub use estimator::{LinearActorCritic, PolicyValueEstimator, Prediction};
pub use metrics::{BatchReport, RunningReward, TrainingReport};
pub use policy::{ActionSampler, GreedySampler, MultinomialSampler};
pub use training::{
    EpisodeTrainer, LabelBanditTrainer, LockstepTrainer, Phase, Rollout, RolloutBuffer,
    TrainingBatch, Transition,
};
pub use vocab::{LabelledCorpus, Vocabulary};
