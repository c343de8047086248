// Demonstration: train a linear actor-critic on a vector of corridor walks.
//
// Run from the repo root:
//   cargo run --example lockstep_a2c -- --envs 8 --batches 200 --t-max 5
//
// Set RUST_LOG=lockstep_a2c=debug to see every update.

use std::env;

use lockstep_a2c::{
    ActorCriticConfig, Action, EnvError, Environment, LinearActorCritic, LockstepTrainer,
    MultinomialSampler, Observation, StepResult, TrainingConfig,
};
use tracing_subscriber::EnvFilter;

/// One-hot position on a corridor of `length` cells.
///
/// Action 1 moves right, action 0 moves left. Reaching the right end pays
/// 1.0 and ends the episode; every other step costs 0.01. Episodes are cut
/// at `4 * length` steps.
struct Corridor {
    length: usize,
    position: usize,
    steps: usize,
}

impl Corridor {
    fn new(length: usize) -> Self {
        Self {
            length,
            position: 0,
            steps: 0,
        }
    }

    fn observation(&self) -> Observation {
        let mut obs = vec![0.0; self.length];
        obs[self.position] = 1.0;
        obs
    }
}

impl Environment for Corridor {
    fn observation_dim(&self) -> usize {
        self.length
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Observation, EnvError> {
        self.position = 0;
        self.steps = 0;
        Ok(self.observation())
    }

    fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        match action {
            0 => self.position = self.position.saturating_sub(1),
            1 => self.position = (self.position + 1).min(self.length - 1),
            _ => {
                return Err(EnvError::InvalidAction {
                    action,
                    num_actions: 2,
                })
            }
        }
        self.steps += 1;

        let goal = self.position == self.length - 1;
        Ok(StepResult {
            observation: self.observation(),
            reward: if goal { 1.0 } else { -0.01 },
            done: goal || self.steps >= 4 * self.length,
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let num_envs: usize = arg_value(&args, "--envs")
        .and_then(|s| s.parse().ok())
        .unwrap_or(8);
    let batches: u32 = arg_value(&args, "--batches")
        .and_then(|s| s.parse().ok())
        .unwrap_or(200);
    let t_max: usize = arg_value(&args, "--t-max")
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let length: usize = arg_value(&args, "--length")
        .and_then(|s| s.parse().ok())
        .unwrap_or(6)
        .max(2);

    let envs: Vec<Corridor> = (0..num_envs).map(|_| Corridor::new(length)).collect();
    let estimator = LinearActorCritic::new(
        length,
        2,
        ActorCriticConfig {
            learning_rate: 0.05,
            ..ActorCriticConfig::default()
        },
    )?;
    let config = TrainingConfig {
        t_max,
        log_every: 20,
        ..TrainingConfig::default()
    };

    let mut trainer =
        LockstepTrainer::new(envs, estimator, MultinomialSampler::seeded(seed), config)?;
    let report = trainer.train(batches)?;

    println!("{report}");
    Ok(())
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
