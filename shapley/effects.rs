use crate::types::input_label;
use ndarray::Array1;
use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use serde::Serialize;
use std::fmt;

/// Two-sided 95% normal quantile used for every confidence interval.
pub const NORMAL_95_QUANTILE: f64 = 1.96;

/// Shapley effects of every input, with standard errors and 95% confidence
/// intervals `effect ± 1.96·SE`.
#[derive(Debug, Clone, Serialize)]
pub struct ShapleyEffects {
    /// Input labels `X1..Xn`.
    pub labels: Vec<String>,
    pub effects: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub ci_lower: Array1<f64>,
    pub ci_upper: Array1<f64>,
    /// Population variance of the unconditional output sample.
    pub output_variance: f64,
    pub n_perms: usize,
}

/// One row of [`ShapleyEffects`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectRow<'a> {
    pub label: &'a str,
    pub effect: f64,
    pub std_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl ShapleyEffects {
    /// Normalizes the accumulated per-input deltas.
    ///
    /// `delta_sums[i]` and `squared_delta_sums[i]` are sums over permutations of
    /// the cost increase when input `i` joined the sampled set, and of its square.
    pub fn from_delta_sums(
        delta_sums: &Array1<f64>,
        squared_delta_sums: &Array1<f64>,
        n_perms: usize,
        output_variance: f64,
    ) -> Self {
        let n = n_perms as f64;
        let effects = delta_sums / (n * output_variance);
        let squared_means = squared_delta_sums / (n * output_variance.powi(2));

        // Cancellation can leave the difference slightly negative.
        let std_errors = ndarray::Zip::from(&squared_means)
            .and(&effects)
            .map_collect(|&sq, &effect| ((sq - effect * effect).max(0.0) / n).sqrt());

        let ci_lower = &effects - &(&std_errors * NORMAL_95_QUANTILE);
        let ci_upper = &effects + &(&std_errors * NORMAL_95_QUANTILE);
        let labels = (0..effects.len()).map(input_label).collect();

        Self {
            labels,
            effects,
            std_errors,
            ci_lower,
            ci_upper,
            output_variance,
            n_perms,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Row of the input at zero-based index `i`, or `None` past the last input.
    pub fn row(&self, i: usize) -> Option<EffectRow<'_>> {
        let label = self.labels.get(i)?;
        Some(EffectRow {
            label,
            effect: self.effects[i],
            std_error: self.std_errors[i],
            ci_lower: self.ci_lower[i],
            ci_upper: self.ci_upper[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = EffectRow<'_>> {
        (0..self.len()).filter_map(|i| self.row(i))
    }

    /// Looks a row up by its label, e.g. `"X2"`.
    pub fn get(&self, label: &str) -> Option<EffectRow<'_>> {
        self.labels
            .iter()
            .position(|candidate| candidate == label)
            .and_then(|i| self.row(i))
    }

    /// Sum of all effects. Equals one up to rounding, since every permutation's
    /// deltas add up to the output variance.
    pub fn total(&self) -> f64 {
        self.effects.sum()
    }

    /// The table as a polars frame with columns
    /// `input, effect, std_error, ci_lower, ci_upper`.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("input".into(), self.labels.clone()).into(),
            Series::new("effect".into(), self.effects.to_vec()).into(),
            Series::new("std_error".into(), self.std_errors.to_vec()).into(),
            Series::new("ci_lower".into(), self.ci_lower.to_vec()).into(),
            Series::new("ci_upper".into(), self.ci_upper.to_vec()).into(),
        ])
    }
}

impl fmt::Display for ShapleyEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self.labels.iter().map(String::len).max().unwrap_or(0).max(5);
        writeln!(
            f,
            "{:<label_width$}  {:>15}  {:>11}  {:>10}  {:>10}",
            "input", "Shapley effects", "std. errors", "CI_min", "CI_max"
        )?;
        for row in self.rows() {
            writeln!(
                f,
                "{:<label_width$}  {:>15.6}  {:>11.6}  {:>10.6}  {:>10.6}",
                row.label, row.effect, row.std_error, row.ci_lower, row.ci_upper
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn sample_effects() -> ShapleyEffects {
        // Two permutations of two inputs with output variance 2.0:
        // input 0 gains 0.5 then 1.5, input 1 gains 1.5 then 0.5.
        ShapleyEffects::from_delta_sums(&array![2.0, 2.0], &array![2.5, 2.5], 2, 2.0)
    }

    #[test]
    fn normalization_and_standard_errors() {
        let effects = sample_effects();
        assert_relative_eq!(effects.effects[0], 0.5);
        assert_relative_eq!(effects.effects[1], 0.5);
        // Mean squared normalized delta is 2.5 / (2 * 4) = 0.3125, so the
        // variance is 0.3125 - 0.25 = 0.0625 and SE = sqrt(0.0625 / 2).
        let se = (0.0625f64 / 2.0).sqrt();
        assert_relative_eq!(effects.std_errors[0], se, epsilon = 1e-12);
        assert_relative_eq!(effects.ci_lower[0], 0.5 - 1.96 * se, epsilon = 1e-12);
        assert_relative_eq!(effects.ci_upper[1], 0.5 + 1.96 * se, epsilon = 1e-12);
        assert_relative_eq!(effects.total(), 1.0);
    }

    #[test]
    fn negative_variance_from_rounding_is_clamped() {
        // Identical deltas: squared mean equals the squared effect, up to rounding.
        let delta = 0.1 + 0.2;
        let effects = ShapleyEffects::from_delta_sums(
            &array![3.0 * delta],
            &array![3.0 * delta * delta * (1.0 - 1e-15)],
            3,
            1.0,
        );
        assert_eq!(effects.std_errors[0], 0.0);
        assert_eq!(effects.ci_lower[0], effects.effects[0]);
    }

    #[test]
    fn rows_are_addressable_by_label() {
        let effects = sample_effects();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects.labels, vec!["X1".to_string(), "X2".to_string()]);
        let row = effects.get("X2").unwrap();
        assert_eq!(row.label, "X2");
        assert_relative_eq!(row.effect, 0.5);
        assert!(effects.get("X3").is_none());
        assert_eq!(effects.rows().count(), 2);
        assert_eq!(effects.row(1), Some(row));
        assert!(effects.row(2).is_none());
    }

    #[test]
    fn display_lists_every_input() {
        let text = sample_effects().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Shapley effects"));
        assert!(lines[0].contains("CI_max"));
        assert!(lines[1].starts_with("X1"));
        assert!(lines[2].starts_with("X2"));
    }

    #[test]
    fn dataframe_has_one_row_per_input() {
        let df = sample_effects().to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 5));
        for name in ["input", "effect", "std_error", "ci_lower", "ci_upper"] {
            assert!(df.column(name).is_ok(), "missing column {name}");
        }

        let effect = df.column("effect").unwrap().as_materialized_series().f64().unwrap();
        assert_eq!(effect.get(0), Some(0.5));
        let input = df.column("input").unwrap().as_materialized_series().str().unwrap();
        assert_eq!(input.get(1), Some("X2"));
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_value(sample_effects()).unwrap();
        assert_eq!(json["labels"][1], "X2");
        assert_eq!(json["n_perms"], 2);
    }
}
