use crate::types::ShapleyError;
use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the orderings of inputs are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermutationMethod {
    /// Every one of the `n_inputs!` orderings, in lexicographic order.
    /// Practical only for a handful of inputs.
    Exact,
    /// A caller-chosen number of uniformly shuffled orderings, drawn with
    /// replacement.
    Random,
}

impl PermutationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Random => "random",
        }
    }

    /// Number of permutations this method will produce.
    ///
    /// Exact mode derives the count as `n_inputs!` and ignores `requested`.
    /// Random mode requires `requested >= 1`.
    pub fn resolve_count(
        self,
        n_inputs: usize,
        requested: Option<usize>,
    ) -> Result<usize, ShapleyError> {
        if n_inputs < 1 {
            return Err(ShapleyError::invalid("n_inputs must be at least 1"));
        }
        match self {
            Self::Exact => (1..=n_inputs)
                .try_fold(1usize, |acc, k| acc.checked_mul(k))
                .ok_or_else(|| {
                    ShapleyError::invalid(format!(
                        "{n_inputs}! permutations do not fit in memory; use the random method"
                    ))
                }),
            Self::Random => match requested {
                Some(count) if count >= 1 => Ok(count),
                Some(count) => Err(ShapleyError::invalid(format!(
                    "random permutations need n_perms >= 1, got {count}"
                ))),
                None => Err(ShapleyError::invalid(
                    "random permutations need an explicit n_perms",
                )),
            },
        }
    }
}

impl fmt::Display for PermutationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermutationMethod {
    type Err = ShapleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "random" => Ok(Self::Random),
            other => Err(ShapleyError::invalid(format!(
                "unknown permutation method '{other}', expected 'exact' or 'random'"
            ))),
        }
    }
}

/// An ordered collection of permutations of `0..n_inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationSet {
    n_inputs: usize,
    orders: Vec<Vec<usize>>,
}

impl PermutationSet {
    /// Wraps caller-supplied orderings, checking each is a permutation of `0..n_inputs`.
    pub fn from_orders(n_inputs: usize, orders: Vec<Vec<usize>>) -> Result<Self, ShapleyError> {
        for (p, order) in orders.iter().enumerate() {
            if !is_permutation(order, n_inputs) {
                return Err(ShapleyError::invalid(format!(
                    "ordering {p} ({order:?}) is not a permutation of 0..{n_inputs}"
                )));
            }
        }
        Ok(Self { n_inputs, orders })
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Ordering number `p`, or `None` when `p >= len()`.
    pub fn get(&self, p: usize) -> Option<&[usize]> {
        self.orders.get(p).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.orders.iter().map(Vec::as_slice)
    }
}

/// Produces the permutations to evaluate.
///
/// `n_perms` is only consulted in random mode; see [`PermutationMethod::resolve_count`].
pub fn generate_permutations<R: Rng + ?Sized>(
    method: PermutationMethod,
    n_inputs: usize,
    n_perms: Option<usize>,
    rng: &mut R,
) -> Result<PermutationSet, ShapleyError> {
    let count = method.resolve_count(n_inputs, n_perms)?;
    if let (PermutationMethod::Exact, Some(hint)) = (method, n_perms) {
        log::warn!(
            "Exact permutations ignore the requested count of {hint}; using all {count} orderings instead."
        );
    }

    let orders: Vec<Vec<usize>> = match method {
        PermutationMethod::Exact => (0..n_inputs).permutations(n_inputs).collect(),
        PermutationMethod::Random => (0..count)
            .map(|_| {
                let mut order: Vec<usize> = (0..n_inputs).collect();
                order.shuffle(rng);
                order
            })
            .collect(),
    };
    debug_assert_eq!(orders.len(), count);

    log::info!(
        "Generated {} {} permutation(s) of {} input(s).",
        orders.len(),
        method,
        n_inputs
    );

    Ok(PermutationSet { n_inputs, orders })
}

/// Position of every original index within `order`: `inverse[order[i]] == i`.
pub fn inverse_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (position, &index) in order.iter().enumerate() {
        inverse[index] = position;
    }
    inverse
}

fn is_permutation(order: &[usize], n_inputs: usize) -> bool {
    if order.len() != n_inputs {
        return false;
    }
    let mut seen = vec![false; n_inputs];
    for &index in order {
        if index >= n_inputs || seen[index] {
            return false;
        }
        seen[index] = true;
    }
    true
}
