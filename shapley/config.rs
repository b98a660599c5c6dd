use crate::design::DesignLayout;
use crate::permutations::PermutationMethod;
use crate::types::ShapleyError;
use serde::{Deserialize, Serialize};

/// Everything that determines the size and shape of an estimate.
///
/// Stored and loaded as TOML, for example:
///
/// ```toml
/// method = "random"
/// n_perms = 200
/// n_inputs = 3
/// n_output = 10000
/// n_outer = 100
/// n_inner = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapleyConfig {
    pub method: PermutationMethod,
    /// Number of random permutations. Ignored by the exact method, which
    /// always evaluates all `n_inputs!` orderings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_perms: Option<usize>,
    pub n_inputs: usize,
    /// Monte Carlo sample size for the total output variance.
    pub n_output: usize,
    /// Outer sample size: conditioning values per split.
    pub n_outer: usize,
    /// Inner sample size: draws per conditioning value.
    pub n_inner: usize,
}

impl ShapleyConfig {
    pub fn exact(n_inputs: usize, n_output: usize, n_outer: usize, n_inner: usize) -> Self {
        Self {
            method: PermutationMethod::Exact,
            n_perms: None,
            n_inputs,
            n_output,
            n_outer,
            n_inner,
        }
    }

    pub fn random(
        n_perms: usize,
        n_inputs: usize,
        n_output: usize,
        n_outer: usize,
        n_inner: usize,
    ) -> Self {
        Self {
            method: PermutationMethod::Random,
            n_perms: Some(n_perms),
            n_inputs,
            n_output,
            n_outer,
            n_inner,
        }
    }

    /// Builds a configuration from a method name, `"exact"` or `"random"`.
    pub fn from_method(
        method: &str,
        n_perms: Option<usize>,
        n_inputs: usize,
        n_output: usize,
        n_outer: usize,
        n_inner: usize,
    ) -> Result<Self, ShapleyError> {
        Ok(Self {
            method: method.parse()?,
            n_perms,
            n_inputs,
            n_output,
            n_outer,
            n_inner,
        })
    }

    /// Resolves the permutation count and checks every dimension, returning the
    /// layout of the design this configuration describes.
    pub fn layout(&self) -> Result<DesignLayout, ShapleyError> {
        let n_perms = self.method.resolve_count(self.n_inputs, self.n_perms)?;
        DesignLayout::new(
            n_perms,
            self.n_inputs,
            self.n_output,
            self.n_outer,
            self.n_inner,
        )
    }

    pub fn validate(&self) -> Result<(), ShapleyError> {
        self.layout().map(|_| ())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ShapleyError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ShapleyError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
