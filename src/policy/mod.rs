//! Action sampling strategies over estimator probability vectors.

pub mod greedy;
pub mod multinomial;
pub mod trait_;

pub use greedy::GreedySampler;
pub use multinomial::MultinomialSampler;
pub use trait_::{validate_distribution, ActionSampler, SampleError};
