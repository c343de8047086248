//! Error types shared by the rollout and training layers.

use thiserror::Error;

use crate::config::ConfigError;
use crate::policy::SampleError;
use crate::vocab::CorpusError;

/// Boxed error produced by an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by an [`Environment`](crate::environment::Environment).
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment error: {0}")]
    Backend(#[from] BoxError),

    #[error("environment stepped after its episode ended")]
    EpisodeFinished,

    #[error("action {action} is not valid for an action space of size {num_actions}")]
    InvalidAction { action: usize, num_actions: usize },
}

/// Errors raised by a [`PolicyValueEstimator`](crate::estimator::PolicyValueEstimator).
#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("estimator expects observations of width {expected}, got {actual}")]
    ObservationWidth { expected: usize, actual: usize },

    #[error("malformed training batch: {0}")]
    MalformedBatch(String),

    #[error("estimator backend error: {0}")]
    Backend(#[from] BoxError),

    #[cfg(feature = "nn")]
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
}

/// Fatal errors of a training run.
///
/// Nothing in the training loop retries: every variant aborts the run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("slot {slot}: observation has {actual} features, expected {expected}")]
    ObservationShape {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    #[error("slot {slot}: cannot sample an action")]
    Sampling {
        slot: usize,
        #[source]
        source: SampleError,
    },

    #[error("action {action} is out of range for {num_actions} actions")]
    ActionOutOfRange { action: usize, num_actions: usize },

    #[error("slot {slot}: rollout buffer has no bootstrap value")]
    MissingBootstrap { slot: usize },

    #[error("rollout buffer is closed")]
    BufferClosed,

    #[error("at least one environment is required")]
    NoEnvironments,
}

/// Result alias for training operations.
pub type Result<T, E = TrainError> = std::result::Result<T, E>;
