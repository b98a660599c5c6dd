//! Contracts for the collaborators a Shapley estimate depends on.
//!
//! The estimator never draws inputs or evaluates the model itself. It asks an
//! [`InputSampler`] for i.i.d. draws of the full input vector, a
//! [`ConditionalSampler`] for draws of an index subset (optionally conditioned
//! on fixed values of another subset), and a [`Model`] for one output per
//! design row.
//!
//! All arrays are row-major in the sense of "one draw per row": a sampler asked
//! for `n` draws of `d` inputs returns an `n × d` array.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::RngCore;
use thiserror::Error;

/// Failures reported by (or detected on the output of) a sampler.
#[derive(Error, Debug)]
pub enum SamplingError {
    #[error(
        "Sampler returned a {found_rows}x{found_cols} array, but {expected_rows}x{expected_cols} draws were requested."
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error(
        "Cannot sample inputs {subset:?} conditioned on inputs {conditioning:?}: {reason}"
    )]
    Infeasible {
        subset: Vec<usize>,
        conditioning: Vec<usize>,
        reason: String,
    },
}

impl SamplingError {
    pub(crate) fn check_shape(
        draws: &Array2<f64>,
        expected_rows: usize,
        expected_cols: usize,
    ) -> Result<(), Self> {
        let (found_rows, found_cols) = draws.dim();
        if found_rows != expected_rows || found_cols != expected_cols {
            return Err(Self::ShapeMismatch {
                expected_rows,
                expected_cols,
                found_rows,
                found_cols,
            });
        }
        Ok(())
    }
}

/// Failures reported by (or detected on the output of) the model.
#[derive(Error, Debug)]
pub enum ModelEvaluationError {
    #[error("Model returned {found} outputs for a design with {expected} rows.")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Model returned a non-finite output ({value}) for design row {row}.")]
    NonFinite { row: usize, value: f64 },

    #[error("{0}")]
    Failed(String),
}

/// Fixed values for a conditioning index set.
///
/// `values[i]` is the value of input `indices[i]`.
#[derive(Debug, Clone, Copy)]
pub struct Conditioning<'a> {
    pub indices: &'a [usize],
    pub values: ArrayView1<'a, f64>,
}

/// The model under analysis, evaluated once on the complete design.
///
/// Implementations must be deterministic: identical rows give identical outputs.
pub trait Model {
    fn evaluate(&self, inputs: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelEvaluationError>;
}

/// Draws i.i.d. samples of the full input vector.
pub trait InputSampler {
    /// Returns an `n × n_inputs` array, one draw per row.
    ///
    /// This is the only accepted orientation. A transposed `n_inputs × n`
    /// array is rejected with [`SamplingError::ShapeMismatch`]; when
    /// `n == n_inputs` the two cannot be told apart and rows are read as draws.
    fn sample(&mut self, n: usize, rng: &mut dyn RngCore) -> Result<Array2<f64>, SamplingError>;
}

/// Draws samples of an input subset, optionally conditioned on fixed values of
/// a disjoint subset.
pub trait ConditionalSampler {
    /// Returns an `n × subset.len()` array whose columns follow `subset` order.
    /// As for [`InputSampler::sample`], rows are draws: a transposed array is
    /// rejected with [`SamplingError::ShapeMismatch`].
    ///
    /// With `given = None` the subset is drawn from its marginal distribution.
    fn sample_conditional(
        &mut self,
        n: usize,
        subset: &[usize],
        given: Option<Conditioning<'_>>,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError>;
}

/// A [`Model`] backed by a closure. Built by [`model_fn`].
pub struct ModelFn<F>(F);

/// Wraps a closure as a [`Model`].
pub fn model_fn<F>(f: F) -> ModelFn<F>
where
    F: Fn(ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelEvaluationError>,
{
    ModelFn(f)
}

impl<F> Model for ModelFn<F>
where
    F: Fn(ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelEvaluationError>,
{
    fn evaluate(&self, inputs: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelEvaluationError> {
        (self.0)(inputs)
    }
}

/// An [`InputSampler`] backed by a closure. Built by [`sampler_fn`].
pub struct SamplerFn<F>(F);

/// Wraps a closure as an [`InputSampler`].
pub fn sampler_fn<F>(f: F) -> SamplerFn<F>
where
    F: FnMut(usize, &mut dyn RngCore) -> Result<Array2<f64>, SamplingError>,
{
    SamplerFn(f)
}

impl<F> InputSampler for SamplerFn<F>
where
    F: FnMut(usize, &mut dyn RngCore) -> Result<Array2<f64>, SamplingError>,
{
    fn sample(&mut self, n: usize, rng: &mut dyn RngCore) -> Result<Array2<f64>, SamplingError> {
        (self.0)(n, rng)
    }
}

/// A [`ConditionalSampler`] backed by a closure. Built by [`conditional_sampler_fn`].
pub struct ConditionalSamplerFn<F>(F);

/// Wraps a closure as a [`ConditionalSampler`].
pub fn conditional_sampler_fn<F>(f: F) -> ConditionalSamplerFn<F>
where
    F: FnMut(
        usize,
        &[usize],
        Option<Conditioning<'_>>,
        &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError>,
{
    ConditionalSamplerFn(f)
}

impl<F> ConditionalSampler for ConditionalSamplerFn<F>
where
    F: FnMut(
        usize,
        &[usize],
        Option<Conditioning<'_>>,
        &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError>,
{
    fn sample_conditional(
        &mut self,
        n: usize,
        subset: &[usize],
        given: Option<Conditioning<'_>>,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError> {
        (self.0)(n, subset, given, rng)
    }
}
