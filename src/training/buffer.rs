//! Per-slot rollout buffer for one accumulation window.

use crate::environment::{Action, Observation};
use crate::error::{Result, TrainError};

/// A single transition stored in the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation the action was chosen from.
    pub observation: Observation,
    /// Sampled action.
    pub action: Action,
    /// Reward after shaping.
    pub reward: f64,
    /// Value estimate of `observation` at sampling time.
    pub value: f64,
}

/// Ordered transitions of one environment slot plus a trailing bootstrap.
///
/// Once [`close`](RolloutBuffer::close)d, the buffer holds exactly one more
/// value than reward: the value at the start of each step, then the value
/// after the last step (0.0 at a natural episode end).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolloutBuffer {
    transitions: Vec<Transition>,
    bootstrap: Option<f64>,
}

impl RolloutBuffer {
    /// Creates a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transition to the buffer.
    ///
    /// # Errors
    ///
    /// [`TrainError::BufferClosed`] if a bootstrap value was already appended.
    pub fn push(&mut self, transition: Transition) -> Result<()> {
        if self.bootstrap.is_some() {
            return Err(TrainError::BufferClosed);
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// Appends the trailing bootstrap value.
    ///
    /// Closing an empty buffer does nothing; it contributes no rows anyway.
    pub fn close(&mut self, bootstrap: f64) -> Result<()> {
        if self.bootstrap.is_some() {
            return Err(TrainError::BufferClosed);
        }
        if !self.transitions.is_empty() {
            self.bootstrap = Some(bootstrap);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.bootstrap.is_some()
    }

    pub fn bootstrap(&self) -> Option<f64> {
        self.bootstrap
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn rewards(&self) -> Vec<f64> {
        self.transitions.iter().map(|t| t.reward).collect()
    }

    /// Per-step value estimates followed by the bootstrap, if closed.
    pub fn values(&self) -> Vec<f64> {
        self.transitions
            .iter()
            .map(|t| t.value)
            .chain(self.bootstrap)
            .collect()
    }

    /// Clears all stored data, reopening the buffer.
    pub fn clear(&mut self) {
        self.transitions.clear();
        self.bootstrap = None;
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(reward: f64, value: f64) -> Transition {
        Transition {
            observation: vec![0.0; 4],
            action: 0,
            reward,
            value,
        }
    }

    #[test]
    fn buffer_add_and_clear() {
        let mut buf = RolloutBuffer::new();
        assert!(buf.is_empty());

        buf.push(transition(1.0, 0.5)).unwrap();
        assert_eq!(buf.len(), 1);

        buf.close(0.0).unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert!(!buf.is_closed());
    }

    #[test]
    fn closed_buffer_has_one_extra_value() {
        let mut buf = RolloutBuffer::new();
        for v in [0.2, 0.3, 0.4] {
            buf.push(transition(1.0, v)).unwrap();
        }
        assert_eq!(buf.values().len(), buf.rewards().len());

        buf.close(0.5).unwrap();
        assert_eq!(buf.values(), vec![0.2, 0.3, 0.4, 0.5]);
        assert_eq!(buf.values().len(), buf.rewards().len() + 1);
    }

    #[test]
    fn push_after_close_is_rejected() {
        let mut buf = RolloutBuffer::new();
        buf.push(transition(1.0, 0.0)).unwrap();
        buf.close(0.0).unwrap();
        assert!(matches!(
            buf.push(transition(1.0, 0.0)),
            Err(TrainError::BufferClosed)
        ));
        assert!(matches!(buf.close(1.0), Err(TrainError::BufferClosed)));
    }

    #[test]
    fn closing_empty_buffer_is_noop() {
        let mut buf = RolloutBuffer::new();
        buf.close(3.0).unwrap();
        assert!(!buf.is_closed());
        assert!(buf.values().is_empty());
    }
}
