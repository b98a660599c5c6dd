#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Shapley effects for global sensitivity analysis of models with dependent
//! inputs, estimated over exhaustive or randomly drawn input orderings.
//!
//! The pipeline runs in three stages: [`permutations`] chooses the orderings,
//! [`design`] builds one nested Monte Carlo design for all of them, and
//! [`estimate`] turns a single model evaluation of that design into
//! [`ShapleyEffects`]. Sampling the inputs, conditional or not, is left to the
//! caller through the traits in [`sampling`].

pub mod config;
pub mod design;
pub mod effects;
pub mod estimate;
pub mod permutations;
pub mod progress;
pub mod sampling;
pub mod types;

pub use config::ShapleyConfig;
pub use effects::{EffectRow, ShapleyEffects};
pub use estimate::{estimate_shapley_effects, estimate_shapley_effects_with_progress};
pub use permutations::PermutationMethod;
pub use types::ShapleyError;
