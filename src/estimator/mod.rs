//! Policy/value estimators.
//!
//! The trainers only depend on [`PolicyValueEstimator`]. Two reference
//! implementations are provided: a dependency-free linear actor-critic and,
//! behind the `nn` feature, an MLP actor-critic on tch-rs.

pub mod linear;
#[cfg(feature = "nn")]
pub mod network;
pub mod trait_;

pub use linear::LinearActorCritic;
#[cfg(feature = "nn")]
pub use network::{ComputeContext, MlpActorCritic};
pub use trait_::{PolicyValueEstimator, Prediction};
