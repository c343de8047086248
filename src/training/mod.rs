//! Rollout collection, advantage estimation and the training loops.
//!
//! Provides the per-slot rollout buffer, GAE computation, the lock-step
//! [`Rollout`] core and three schedulers built on it.

pub mod bandit;
pub mod batch;
pub mod buffer;
pub mod episode;
pub mod gae;
pub mod lockstep;
pub mod rollout;

#[cfg(test)]
mod tests;

pub use bandit::LabelBanditTrainer;
pub use batch::TrainingBatch;
pub use buffer::{RolloutBuffer, Transition};
pub use episode::EpisodeTrainer;
pub use gae::{compute_targets, discount, discounted_returns, gae_advantages, td_residuals};
pub use lockstep::LockstepTrainer;
pub use rollout::{EpisodeSlot, FinishedEpisode, FlushOutcome, Phase, Rollout};
