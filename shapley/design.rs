//! Construction of the nested Monte Carlo design.
//!
//! The design is a single `(total_rows, n_inputs)` matrix with two row regions:
//!
//! 1. rows `[0, n_output)`: i.i.d. draws of the full input vector, used to
//!    estimate the total output variance;
//! 2. for each permutation `p`, split `j` in `1..n_inputs` and outer draw `l`
//!    in `0..n_outer`, a block of `n_inner` rows starting at
//!    `n_output + p*(n_inputs-1)*n_outer*n_inner + (j-1)*n_outer*n_inner + l*n_inner`.
//!    Each block holds draws of the first `j` permuted inputs conditioned on one
//!    outer draw of the remaining ones.
//!
//! Column `k` of every row always holds original input `k`, whatever the
//! permutation that produced the row.
//!
//! The builder here and the estimator in [`crate::estimate`] both walk the
//! blocks through [`DesignLayout::splits_of`] and [`SplitPoint::blocks`], so
//! the order in which blocks are written is the order in which they are read.

use crate::permutations::{PermutationSet, inverse_permutation};
use crate::progress::{ShapleyProgressObserver, ShapleyStage};
use crate::sampling::{ConditionalSampler, Conditioning, InputSampler, SamplingError};
use crate::types::ShapleyError;
use ndarray::{Array2, ArrayView1, ArrayViewMut1, s};
use rand::RngCore;
use std::ops::Range;

/// Designs above this size trigger a warning before allocation.
pub const LARGE_DESIGN_BYTES: usize = 1 << 30;

/// Dimensions of a design and the arithmetic that places every block in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignLayout {
    n_perms: usize,
    n_inputs: usize,
    n_output: usize,
    n_outer: usize,
    n_inner: usize,
    total_rows: usize,
}

impl DesignLayout {
    /// Checks the dimensions and computes the total row count without overflow.
    pub fn new(
        n_perms: usize,
        n_inputs: usize,
        n_output: usize,
        n_outer: usize,
        n_inner: usize,
    ) -> Result<Self, ShapleyError> {
        if n_inputs < 1 {
            return Err(ShapleyError::invalid("n_inputs must be at least 1"));
        }
        if n_perms < 1 {
            return Err(ShapleyError::invalid("n_perms must be at least 1"));
        }
        if n_output < 1 {
            return Err(ShapleyError::invalid("n_output must be at least 1"));
        }
        if n_outer < 1 {
            return Err(ShapleyError::invalid("n_outer must be at least 1"));
        }
        if n_inputs > 1 && n_inner < 2 {
            return Err(ShapleyError::invalid(format!(
                "n_inner must be at least 2 to estimate a conditional variance, got {n_inner}"
            )));
        }

        let overflow = || ShapleyError::invalid("design row count overflows usize");
        let conditional_rows = n_perms
            .checked_mul(n_inputs - 1)
            .and_then(|rows| rows.checked_mul(n_outer))
            .and_then(|rows| rows.checked_mul(n_inner))
            .ok_or_else(overflow)?;
        let total_rows = n_output.checked_add(conditional_rows).ok_or_else(overflow)?;
        total_rows
            .checked_mul(n_inputs)
            .and_then(|cells| cells.checked_mul(std::mem::size_of::<f64>()))
            .ok_or_else(overflow)?;

        Ok(Self {
            n_perms,
            n_inputs,
            n_output,
            n_outer,
            n_inner,
            total_rows,
        })
    }

    pub fn n_perms(&self) -> usize {
        self.n_perms
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_output(&self) -> usize {
        self.n_output
    }

    pub fn n_outer(&self) -> usize {
        self.n_outer
    }

    pub fn n_inner(&self) -> usize {
        self.n_inner
    }

    /// `n_output + n_perms*(n_inputs-1)*n_outer*n_inner`.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Size of the design matrix in bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_rows * self.n_inputs * std::mem::size_of::<f64>()
    }

    /// Fails unless `permutations` has exactly the permutation count and width
    /// this layout was sized for.
    pub fn check_permutations(&self, permutations: &PermutationSet) -> Result<(), ShapleyError> {
        if permutations.len() != self.n_perms || permutations.n_inputs() != self.n_inputs {
            return Err(ShapleyError::invalid(format!(
                "layout expects {} permutation(s) of {} input(s), got {} of {}",
                self.n_perms,
                self.n_inputs,
                permutations.len(),
                permutations.n_inputs()
            )));
        }
        Ok(())
    }

    /// Number of splits that need a sampled block; the last split of every
    /// permutation uses the output variance directly.
    pub fn splits_per_permutation(&self) -> usize {
        self.n_inputs - 1
    }

    /// First row of the block for permutation `perm`, split `split` (in
    /// `1..n_inputs`) and outer draw `outer`.
    pub fn block_offset(&self, perm: usize, split: usize, outer: usize) -> usize {
        debug_assert!(perm < self.n_perms);
        debug_assert!((1..self.n_inputs).contains(&split));
        debug_assert!(outer < self.n_outer);
        let block = self.n_outer * self.n_inner;
        self.n_output
            + perm * self.splits_per_permutation() * block
            + (split - 1) * block
            + outer * self.n_inner
    }

    /// Splits `1..n_inputs` of one permutation, in increasing order.
    pub fn splits_of(&self, perm: usize) -> impl Iterator<Item = SplitPoint> + use<> {
        let layout = *self;
        (1..layout.n_inputs).map(move |split| SplitPoint {
            perm,
            split,
            first_row: layout.block_offset(perm, split, 0),
            n_outer: layout.n_outer,
            n_inner: layout.n_inner,
        })
    }

    /// Every split of every permutation, in design order.
    pub fn splits(&self) -> impl Iterator<Item = SplitPoint> {
        let layout = *self;
        (0..layout.n_perms).flat_map(move |perm| layout.splits_of(perm))
    }
}

/// One split point `j` of one permutation `p`: the first `j` permuted inputs
/// are sampled, the rest are held fixed at an outer draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    pub perm: usize,
    pub split: usize,
    first_row: usize,
    n_outer: usize,
    n_inner: usize,
}

impl SplitPoint {
    /// `(outer, rows)` for each of the `n_outer` inner blocks of this split.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, Range<usize>)> + use<> {
        let first_row = self.first_row;
        let n_inner = self.n_inner;
        (0..self.n_outer).map(move |outer| {
            let start = first_row + outer * n_inner;
            (outer, start..start + n_inner)
        })
    }

    /// Rows covered by all blocks of this split.
    pub fn rows(&self) -> Range<usize> {
        self.first_row..self.first_row + self.n_outer * self.n_inner
    }

    /// The sampled (`Sj`) and conditioning (`Sjc`) index sets for `order`.
    pub fn partition<'a>(&self, order: &'a [usize]) -> (&'a [usize], &'a [usize]) {
        order.split_at(self.split)
    }
}

/// Writes one design row in original input order.
///
/// `sampled` holds the first `sampled.len()` permuted inputs, `fixed` the
/// remaining ones; `inverse[k]` is the position of original input `k` in the
/// permutation.
pub fn scatter_row(
    mut row: ArrayViewMut1<'_, f64>,
    sampled: ArrayView1<'_, f64>,
    fixed: ArrayView1<'_, f64>,
    inverse: &[usize],
) {
    let split = sampled.len();
    for (k, &position) in inverse.iter().enumerate() {
        row[k] = if position < split {
            sampled[position]
        } else {
            fixed[position - split]
        };
    }
}

/// Builds the full design for `permutations`.
///
/// Sampler failures propagate unmodified and abort the build.
pub fn build_design<X, C>(
    layout: &DesignLayout,
    permutations: &PermutationSet,
    unconditional: &mut X,
    conditional: &mut C,
    rng: &mut dyn RngCore,
    progress: &mut dyn ShapleyProgressObserver,
) -> Result<Array2<f64>, ShapleyError>
where
    X: InputSampler + ?Sized,
    C: ConditionalSampler + ?Sized,
{
    let n_inputs = layout.n_inputs();
    layout.check_permutations(permutations)?;

    if layout.total_bytes() > LARGE_DESIGN_BYTES {
        log::warn!(
            "Design matrix needs {:.2} GiB ({} rows x {} inputs) held in memory at once.",
            layout.total_bytes() as f64 / (1u64 << 30) as f64,
            layout.total_rows(),
            n_inputs
        );
    }
    log::info!(
        "Building design with {} rows ({} unconditional, {} conditional).",
        layout.total_rows(),
        layout.n_output(),
        layout.total_rows() - layout.n_output()
    );

    let mut design = Array2::<f64>::zeros((layout.total_rows(), n_inputs));

    let draws = unconditional.sample(layout.n_output(), rng)?;
    SamplingError::check_shape(&draws, layout.n_output(), n_inputs)?;
    design.slice_mut(s![..layout.n_output(), ..]).assign(&draws);

    progress.on_stage_start(ShapleyStage::DesignConstruction, layout.n_perms());
    let filled = fill_conditional_blocks(
        layout,
        permutations,
        conditional,
        &mut design,
        rng,
        progress,
    );
    progress.on_stage_finish(ShapleyStage::DesignConstruction);
    filled?;

    Ok(design)
}

/// Writes every inner block, one permutation at a time.
fn fill_conditional_blocks<C>(
    layout: &DesignLayout,
    permutations: &PermutationSet,
    conditional: &mut C,
    design: &mut Array2<f64>,
    rng: &mut dyn RngCore,
    progress: &mut dyn ShapleyProgressObserver,
) -> Result<(), ShapleyError>
where
    C: ConditionalSampler + ?Sized,
{
    for (p, order) in permutations.iter().enumerate() {
        let inverse = inverse_permutation(order);

        for split in layout.splits_of(p) {
            let (sampled_set, fixed_set) = split.partition(order);

            let outer_draws =
                conditional.sample_conditional(layout.n_outer(), fixed_set, None, rng)?;
            SamplingError::check_shape(&outer_draws, layout.n_outer(), fixed_set.len())?;

            for (outer, rows) in split.blocks() {
                let fixed = outer_draws.row(outer);
                let inner_draws = conditional.sample_conditional(
                    layout.n_inner(),
                    sampled_set,
                    Some(Conditioning {
                        indices: fixed_set,
                        values: fixed,
                    }),
                    rng,
                )?;
                SamplingError::check_shape(&inner_draws, layout.n_inner(), sampled_set.len())?;

                let mut block = design.slice_mut(s![rows.start..rows.end, ..]);
                for (row, sampled) in block.rows_mut().into_iter().zip(inner_draws.rows()) {
                    scatter_row(row, sampled, fixed, &inverse);
                }
            }
        }
        progress.on_stage_advance(ShapleyStage::DesignConstruction, p + 1);
    }

    Ok(())
}
