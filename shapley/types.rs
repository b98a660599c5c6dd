use crate::sampling::{ModelEvaluationError, SamplingError};
use thiserror::Error;

/// Every failure that can abort a Shapley estimate.
///
/// Nothing is caught or retried internally. A single failing sampler call or
/// model evaluation aborts the whole estimate, because each permutation's
/// contribution must telescope to the full output variance.
#[derive(Error, Debug)]
pub enum ShapleyError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sampling failed: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Model evaluation failed: {0}")]
    ModelEvaluation(#[from] ModelEvaluationError),

    #[error(
        "The unconditional output sample has zero variance; Shapley effects cannot be normalized."
    )]
    ZeroOutputVariance,

    #[error("Failed to parse TOML configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration to TOML format: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl ShapleyError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Label of the input at zero-based `index`, numbered from one (`X1`, `X2`, ...).
pub fn input_label(index: usize) -> String {
    format!("X{}", index + 1)
}
