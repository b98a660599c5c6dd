//! Shapley effects from a single evaluation of the nested design.
//!
//! For every permutation the estimator walks the split points in increasing
//! order. The cost of split `j` is `E[Var(Y | X_{-S})]` where `S` holds the
//! first `j + 1` permuted inputs: the mean, over the `n_outer` blocks written
//! for that split, of the Bessel-corrected variance of each block's `n_inner`
//! outputs. The last split conditions on nothing, so its cost is the output
//! variance itself. The increase in cost from one split to the next is
//! credited to the input that joined `S`.
//!
//! The output variance is the population variance (no Bessel correction) of
//! the first `n_output` outputs.

use crate::config::ShapleyConfig;
use crate::design::{DesignLayout, build_design};
use crate::effects::ShapleyEffects;
use crate::permutations::{PermutationSet, generate_permutations};
use crate::progress::{NoopShapleyProgress, ShapleyProgressObserver, ShapleyStage};
use crate::sampling::{ConditionalSampler, InputSampler, Model, ModelEvaluationError};
use crate::types::ShapleyError;
use ndarray::{Array1, Array2, ArrayView1, s};
use rand::Rng;

/// Estimates Shapley effects for `model`.
///
/// The design holds `n_output + n_perms*(n_inputs-1)*n_outer*n_inner` rows and
/// is kept in memory in full, together with the model's output for every row.
///
/// # Errors
///
/// * [`ShapleyError::InvalidArgument`] for an inconsistent configuration,
///   before any sampling happens.
/// * [`ShapleyError::Sampling`] and [`ShapleyError::ModelEvaluation`] as
///   reported by the collaborators. Outputs of the wrong length, or containing
///   NaN or infinite values, are reported as model evaluation errors.
/// * [`ShapleyError::ZeroOutputVariance`] when the unconditional outputs are
///   all equal.
pub fn estimate_shapley_effects<M, X, C, R>(
    config: &ShapleyConfig,
    model: &M,
    unconditional: &mut X,
    conditional: &mut C,
    rng: &mut R,
) -> Result<ShapleyEffects, ShapleyError>
where
    M: Model + ?Sized,
    X: InputSampler + ?Sized,
    C: ConditionalSampler + ?Sized,
    R: Rng,
{
    estimate_shapley_effects_with_progress(
        config,
        model,
        unconditional,
        conditional,
        rng,
        &mut NoopShapleyProgress,
    )
}

/// [`estimate_shapley_effects`] reporting each stage to `progress`.
pub fn estimate_shapley_effects_with_progress<M, X, C, R>(
    config: &ShapleyConfig,
    model: &M,
    unconditional: &mut X,
    conditional: &mut C,
    rng: &mut R,
    progress: &mut dyn ShapleyProgressObserver,
) -> Result<ShapleyEffects, ShapleyError>
where
    M: Model + ?Sized,
    X: InputSampler + ?Sized,
    C: ConditionalSampler + ?Sized,
    R: Rng,
{
    let layout = config.layout()?;
    let permutations = generate_permutations(config.method, config.n_inputs, config.n_perms, rng)?;

    let design = build_design(
        &layout,
        &permutations,
        unconditional,
        conditional,
        rng,
        progress,
    )?;

    progress.on_stage_start(ShapleyStage::ModelEvaluation, 1);
    log::info!("Evaluating the model on {} design rows.", layout.total_rows());
    let evaluated = model.evaluate(design.view()).and_then(|output| {
        check_model_output(&layout, output.view())?;
        Ok(output)
    });
    if evaluated.is_ok() {
        progress.on_stage_advance(ShapleyStage::ModelEvaluation, 1);
    }
    progress.on_stage_finish(ShapleyStage::ModelEvaluation);
    let output = evaluated?;
    drop(design);

    estimate_effects(&layout, &permutations, output.view(), progress)
}

/// One finite output per design row.
fn check_model_output(
    layout: &DesignLayout,
    output: ArrayView1<'_, f64>,
) -> Result<(), ModelEvaluationError> {
    if output.len() != layout.total_rows() {
        return Err(ModelEvaluationError::LengthMismatch {
            expected: layout.total_rows(),
            found: output.len(),
        });
    }
    match output.iter().position(|value| !value.is_finite()) {
        Some(row) => Err(ModelEvaluationError::NonFinite {
            row,
            value: output[row],
        }),
        None => Ok(()),
    }
}

/// Population variance of the unconditional block `output[..n_output]`.
pub fn output_variance(layout: &DesignLayout, output: ArrayView1<'_, f64>) -> f64 {
    output.slice(s![..layout.n_output()]).var(0.0)
}

/// Cost of every split of every permutation, shape `(n_perms, n_inputs)`.
///
/// Column `j < n_inputs - 1` is the mean Bessel-corrected variance over the
/// blocks of split `j + 1`; the last column is `output_variance`.
pub fn estimate_costs(
    layout: &DesignLayout,
    output: ArrayView1<'_, f64>,
    output_variance: f64,
    progress: &mut dyn ShapleyProgressObserver,
) -> Array2<f64> {
    let n_inputs = layout.n_inputs();
    let mut costs = Array2::<f64>::zeros((layout.n_perms(), n_inputs));

    progress.on_stage_start(ShapleyStage::EffectEstimation, layout.n_perms());
    for p in 0..layout.n_perms() {
        for split in layout.splits_of(p) {
            let conditional_variance_sum: f64 = split
                .blocks()
                .map(|(_, rows)| output.slice(s![rows.start..rows.end]).var(1.0))
                .sum();
            costs[[p, split.split - 1]] = conditional_variance_sum / layout.n_outer() as f64;
        }
        costs[[p, n_inputs - 1]] = output_variance;
        progress.on_stage_advance(ShapleyStage::EffectEstimation, p + 1);
    }
    progress.on_stage_finish(ShapleyStage::EffectEstimation);

    costs
}

/// Cost increase at every split, `costs[j] - costs[j - 1]` with an implicit
/// zero before the first split. Each row sums to the output variance.
pub fn cost_deltas(costs: &Array2<f64>) -> Array2<f64> {
    let mut deltas = costs.clone();
    for mut row in deltas.rows_mut() {
        let mut previous_cost = 0.0;
        for cost in row.iter_mut() {
            let estimated_cost = *cost;
            *cost = estimated_cost - previous_cost;
            previous_cost = estimated_cost;
        }
    }
    deltas
}

/// Turns the model output for a design built from `layout` and
/// `permutations` into Shapley effects.
pub fn estimate_effects(
    layout: &DesignLayout,
    permutations: &PermutationSet,
    output: ArrayView1<'_, f64>,
    progress: &mut dyn ShapleyProgressObserver,
) -> Result<ShapleyEffects, ShapleyError> {
    layout.check_permutations(permutations)?;
    check_model_output(layout, output)?;

    let variance = output_variance(layout, output);
    log::debug!("Output variance over {} draws: {:.6e}", layout.n_output(), variance);
    if variance <= 0.0 {
        return Err(ShapleyError::ZeroOutputVariance);
    }

    let costs = estimate_costs(layout, output, variance, progress);
    let deltas = cost_deltas(&costs);

    let n_inputs = layout.n_inputs();
    let mut delta_sums = Array1::<f64>::zeros(n_inputs);
    let mut squared_delta_sums = Array1::<f64>::zeros(n_inputs);
    for (order, row) in permutations.iter().zip(deltas.rows()) {
        for (&input, &delta) in order.iter().zip(row.iter()) {
            delta_sums[input] += delta;
            squared_delta_sums[input] += delta * delta;
        }
    }

    let effects = ShapleyEffects::from_delta_sums(
        &delta_sums,
        &squared_delta_sums,
        layout.n_perms(),
        variance,
    );
    log::info!(
        "Estimated Shapley effects for {} inputs over {} permutations (sum {:.4}).",
        n_inputs,
        layout.n_perms(),
        effects.total()
    );
    Ok(effects)
}
