//! MLP actor-critic on tch-rs (PyTorch bindings).
//!
//! A shared ReLU trunk feeds a softmax policy head and a linear value head.
//! This module is only available with the `nn` feature.

use tch::{nn, nn::Module, nn::OptimizerConfig, Device, Kind, Tensor};

use super::trait_::{PolicyValueEstimator, Prediction};
use crate::config::ActorCriticConfig;
use crate::environment::Observation;
use crate::error::{EstimatorError, TrainError};
use crate::training::TrainingBatch;

/// Compute context shared by the networks of one run.
///
/// Passed explicitly to every network constructor.
#[derive(Debug, Clone, Copy)]
pub struct ComputeContext {
    device: Device,
}

impl ComputeContext {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn cpu() -> Self {
        Self::new(Device::Cpu)
    }

    /// Uses the first CUDA device when one is available.
    pub fn cuda_if_available() -> Self {
        Self::new(Device::cuda_if_available())
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

/// Actor-critic network with an Adam optimizer.
///
/// Architecture: `obs_dim → hidden (ReLU)`, then `hidden → num_actions`
/// (softmax) and `hidden → 1`.
pub struct MlpActorCritic {
    vs: nn::VarStore,
    trunk: nn::Sequential,
    policy_head: nn::Linear,
    value_head: nn::Linear,
    optimizer: nn::Optimizer,
    config: ActorCriticConfig,
    device: Device,
    obs_dim: usize,
    num_actions: usize,
}

impl MlpActorCritic {
    /// Creates a new network.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Compute context (device)
    /// * `obs_dim` - Observation width
    /// * `num_actions` - Size of the discrete action space
    /// * `hidden` - Width of the shared hidden layer
    /// * `config` - Loss weights and learning rate
    pub fn new(
        ctx: &ComputeContext,
        obs_dim: usize,
        num_actions: usize,
        hidden: usize,
        config: ActorCriticConfig,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        let vs = nn::VarStore::new(ctx.device());
        let p = &vs.root();
        let trunk = nn::seq()
            .add(nn::linear(
                p / "trunk",
                obs_dim as i64,
                hidden as i64,
                Default::default(),
            ))
            .add_fn(|x| x.relu());
        let policy_head = nn::linear(
            p / "policy",
            hidden as i64,
            num_actions as i64,
            Default::default(),
        );
        let value_head = nn::linear(p / "value", hidden as i64, 1, Default::default());
        let optimizer = nn::Adam::default()
            .build(&vs, config.learning_rate)
            .map_err(EstimatorError::from)?;

        Ok(Self {
            vs,
            trunk,
            policy_head,
            value_head,
            optimizer,
            config,
            device: ctx.device(),
            obs_dim,
            num_actions,
        })
    }

    /// Returns a reference to the variable store.
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Stacks observations into a `[n, obs_dim]` float tensor.
    fn observations_tensor(&self, rows: &[Observation]) -> Result<Tensor, EstimatorError> {
        let mut flat = Vec::with_capacity(rows.len() * self.obs_dim);
        for row in rows {
            if row.len() != self.obs_dim {
                return Err(EstimatorError::ObservationWidth {
                    expected: self.obs_dim,
                    actual: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Ok(Tensor::from_slice(&flat)
            .reshape([rows.len() as i64, self.obs_dim as i64])
            .to_kind(Kind::Float)
            .to_device(self.device))
    }

    fn column(&self, values: &[f64]) -> Tensor {
        Tensor::from_slice(values)
            .to_kind(Kind::Float)
            .to_device(self.device)
    }

    /// Forward pass: `(log_probs [n, A], values [n])`.
    fn forward(&self, xs: &Tensor) -> (Tensor, Tensor) {
        let hidden = self.trunk.forward(xs);
        let log_probs = self
            .policy_head
            .forward(&hidden)
            .log_softmax(-1, Kind::Float);
        let values = self.value_head.forward(&hidden).squeeze_dim(-1);
        (log_probs, values)
    }
}

impl PolicyValueEstimator for MlpActorCritic {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn predict(&mut self, observations: &[Observation]) -> Result<Prediction, EstimatorError> {
        if observations.is_empty() {
            return Ok(Prediction::default());
        }
        let xs = self.observations_tensor(observations)?;
        let (log_probs, values) = tch::no_grad(|| self.forward(&xs));

        let probs = log_probs.exp().to_kind(Kind::Double).flatten(0, -1);
        let probs = Vec::<f64>::try_from(&probs)?;
        let values = Vec::<f64>::try_from(&values.to_kind(Kind::Double))?;

        Ok(Prediction {
            action_probs: probs
                .chunks(self.num_actions)
                .map(|row| row.to_vec())
                .collect(),
            values,
        })
    }

    fn update(&mut self, batch: &TrainingBatch) -> Result<f64, EstimatorError> {
        let n = batch.len();
        if n == 0 {
            return Ok(0.0);
        }
        if batch.returns.len() != n || batch.advantages.len() != n {
            return Err(EstimatorError::MalformedBatch(format!(
                "{} observations, {} returns, {} advantages",
                n,
                batch.returns.len(),
                batch.advantages.len()
            )));
        }

        let xs = self.observations_tensor(&batch.observations)?;
        let mut flat_actions = Vec::with_capacity(n * self.num_actions);
        for row in &batch.actions_one_hot {
            if row.len() != self.num_actions {
                return Err(EstimatorError::MalformedBatch(format!(
                    "one-hot action has width {}, expected {}",
                    row.len(),
                    self.num_actions
                )));
            }
            flat_actions.extend_from_slice(row);
        }
        let actions = Tensor::from_slice(&flat_actions)
            .reshape([n as i64, self.num_actions as i64])
            .to_kind(Kind::Float)
            .to_device(self.device);
        let returns = self.column(&batch.returns);
        let advantages = self.column(&batch.advantages);

        let (log_probs, values) = self.forward(&xs);
        let taken = (&log_probs * &actions).sum_dim_intlist([-1].as_slice(), false, Kind::Float);
        let actor_loss = -(taken * &advantages).sum(Kind::Float);
        let critic_loss = (&values - &returns).square().sum(Kind::Float) * 0.5;
        let entropy = -(log_probs.exp() * &log_probs).sum(Kind::Float);

        let loss = actor_loss + critic_loss * self.config.critic_coef
            - entropy * self.config.entropy_coef;
        self.optimizer.backward_step(&loss);

        Ok(f64::try_from(&loss)?)
    }

    fn name(&self) -> &str {
        "mlp-actor-critic"
    }
}
