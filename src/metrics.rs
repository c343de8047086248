//! Training-progress bookkeeping.
//!
//! Nothing here feeds back into learning: the running reward and the
//! reports exist for logging and learning curves only.

use std::fmt;

/// Smoothing factor of the running reward.
pub const RUNNING_REWARD_DECAY: f64 = 0.99;

/// Exponentially smoothed episode reward.
///
/// Seeded with the first observed episode reward, then updated as
/// `decay * running + (1 - decay) * reward`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningReward {
    value: Option<f64>,
    decay: f64,
}

impl RunningReward {
    pub fn new() -> Self {
        Self::with_decay(RUNNING_REWARD_DECAY)
    }

    pub fn with_decay(decay: f64) -> Self {
        Self { value: None, decay }
    }

    /// Folds one completed episode's reward in and returns the new value.
    pub fn record(&mut self, episode_reward: f64) -> f64 {
        let next = match self.value {
            None => episode_reward,
            Some(running) => self.decay * running + (1.0 - self.decay) * episode_reward,
        };
        self.value = Some(next);
        next
    }

    /// Current value, or `None` before the first episode.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Default for RunningReward {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one batch (one episode per slot, or one bandit batch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Episode reward of each slot, in slot order.
    pub episode_rewards: Vec<f64>,
    /// Episode length of each slot, in slot order.
    pub episode_steps: Vec<usize>,
    /// Ticks executed.
    pub ticks: usize,
    /// Parameter updates performed.
    pub updates: usize,
    /// Loss of each update.
    pub losses: Vec<f64>,
    /// Whether any episode hit the step cap without terminating.
    pub truncated: bool,
}

impl BatchReport {
    pub fn mean_reward(&self) -> f64 {
        if self.episode_rewards.is_empty() {
            return 0.0;
        }
        self.episode_rewards.iter().sum::<f64>() / self.episode_rewards.len() as f64
    }

    pub fn total_reward(&self) -> f64 {
        self.episode_rewards.iter().sum()
    }

    pub fn mean_loss(&self) -> Option<f64> {
        if self.losses.is_empty() {
            return None;
        }
        Some(self.losses.iter().sum::<f64>() / self.losses.len() as f64)
    }
}

/// One point of a learning curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub batch: u32,
    pub mean_reward: f64,
    pub running_reward: f64,
}

/// Summary of a full training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub curve: Vec<CurvePoint>,
    pub episodes: u64,
    pub updates: u64,
    pub ticks: u64,
}

impl TrainingReport {
    pub(crate) fn push(&mut self, batch: u32, report: &BatchReport, running_reward: f64) {
        self.curve.push(CurvePoint {
            batch,
            mean_reward: report.mean_reward(),
            running_reward,
        });
        self.episodes += report.episode_rewards.len() as u64;
        self.updates += report.updates as u64;
        self.ticks += report.ticks as u64;
    }

    /// Running reward after the final batch.
    pub fn final_running_reward(&self) -> Option<f64> {
        self.curve.last().map(|p| p.running_reward)
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Training Report ({} batches) ===", self.curve.len())?;
        writeln!(f, "  Episodes:        {}", self.episodes)?;
        writeln!(f, "  Updates:         {}", self.updates)?;
        writeln!(f, "  Ticks:           {}", self.ticks)?;
        match self.final_running_reward() {
            Some(r) => writeln!(f, "  Running reward:  {:.3}", r),
            None => writeln!(f, "  Running reward:  n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_reward_smoothing() {
        let mut running = RunningReward::new();
        assert_eq!(running.value(), None);

        let expected = [10.0, 10.1, 10.099];
        for (reward, want) in [10.0, 20.0, 10.0].into_iter().zip(expected) {
            let got = running.record(reward);
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert!((running.value().unwrap() - 10.099).abs() < 1e-9);
    }

    #[test]
    fn batch_report_means() {
        let report = BatchReport {
            episode_rewards: vec![1.0, 3.0],
            losses: vec![0.5, 1.5],
            ..BatchReport::default()
        };
        assert_eq!(report.mean_reward(), 2.0);
        assert_eq!(report.total_reward(), 4.0);
        assert_eq!(report.mean_loss(), Some(1.0));
        assert_eq!(BatchReport::default().mean_loss(), None);
    }

    #[test]
    fn training_report_accumulates() {
        let mut report = TrainingReport::default();
        let batch = BatchReport {
            episode_rewards: vec![2.0, 4.0],
            ticks: 7,
            updates: 2,
            ..BatchReport::default()
        };
        report.push(0, &batch, 3.0);
        report.push(1, &batch, 3.1);
        assert_eq!(report.episodes, 4);
        assert_eq!(report.updates, 4);
        assert_eq!(report.ticks, 14);
        assert_eq!(report.final_running_reward(), Some(3.1));
        assert!(report.to_string().contains("2 batches"));
    }
}
