//! Input distributions with closed-form conditionals, shared by the
//! integration tests.

use ndarray::{Array1, Array2, ArrayView2};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use shapley::sampling::{
    ConditionalSampler, Conditioning, InputSampler, ModelEvaluationError, SamplingError,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    rng.sample(StandardNormal)
}

/// Independent centred normal inputs with the given standard deviations.
pub struct IndependentNormal {
    pub std_devs: Vec<f64>,
}

impl IndependentNormal {
    pub fn standard(n_inputs: usize) -> Self {
        Self {
            std_devs: vec![1.0; n_inputs],
        }
    }

    fn draw(&self, n: usize, subset: &[usize], rng: &mut dyn RngCore) -> Array2<f64> {
        Array2::from_shape_fn((n, subset.len()), |(_, c)| {
            self.std_devs[subset[c]] * standard_normal(rng)
        })
    }
}

impl InputSampler for IndependentNormal {
    fn sample(&mut self, n: usize, rng: &mut dyn RngCore) -> Result<Array2<f64>, SamplingError> {
        let all: Vec<usize> = (0..self.std_devs.len()).collect();
        Ok(self.draw(n, &all, rng))
    }
}

impl ConditionalSampler for IndependentNormal {
    fn sample_conditional(
        &mut self,
        n: usize,
        subset: &[usize],
        _: Option<Conditioning<'_>>,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError> {
        Ok(self.draw(n, subset, rng))
    }
}

/// Two standard normal inputs with correlation `rho`.
pub struct BivariateNormal {
    pub rho: f64,
}

impl BivariateNormal {
    fn residual_sd(&self) -> f64 {
        (1.0 - self.rho * self.rho).max(0.0).sqrt()
    }

    fn joint(&self, rng: &mut dyn RngCore) -> [f64; 2] {
        let first = standard_normal(rng);
        let second = self.rho * first + self.residual_sd() * standard_normal(rng);
        [first, second]
    }
}

impl InputSampler for BivariateNormal {
    fn sample(&mut self, n: usize, rng: &mut dyn RngCore) -> Result<Array2<f64>, SamplingError> {
        let mut draws = Array2::zeros((n, 2));
        for mut row in draws.rows_mut() {
            let [first, second] = self.joint(rng);
            row[0] = first;
            row[1] = second;
        }
        Ok(draws)
    }
}

impl ConditionalSampler for BivariateNormal {
    fn sample_conditional(
        &mut self,
        n: usize,
        subset: &[usize],
        given: Option<Conditioning<'_>>,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<f64>, SamplingError> {
        match (subset.len(), given) {
            (1, None) => Ok(Array2::from_shape_fn((n, 1), |_| standard_normal(rng))),
            (2, None) => {
                let mut draws = Array2::zeros((n, 2));
                for mut row in draws.rows_mut() {
                    let joint = self.joint(rng);
                    row[0] = joint[subset[0]];
                    row[1] = joint[subset[1]];
                }
                Ok(draws)
            }
            (1, Some(fixed)) if fixed.indices.len() == 1 => {
                let sd = self.residual_sd();
                if sd <= 1e-12 {
                    return Err(SamplingError::Infeasible {
                        subset: subset.to_vec(),
                        conditioning: fixed.indices.to_vec(),
                        reason: "singular conditional covariance".to_string(),
                    });
                }
                let mean = self.rho * fixed.values[0];
                Ok(Array2::from_shape_fn((n, 1), |_| {
                    mean + sd * standard_normal(rng)
                }))
            }
            _ => Err(SamplingError::Infeasible {
                subset: subset.to_vec(),
                conditioning: given.map(|g| g.indices.to_vec()).unwrap_or_default(),
                reason: "only two inputs are modelled".to_string(),
            }),
        }
    }
}

/// `Y = Σ wᵢ Xᵢ`.
pub fn linear_model(
    weights: Vec<f64>,
) -> impl Fn(ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelEvaluationError> {
    let weights = Array1::from(weights);
    move |inputs: ArrayView2<'_, f64>| Ok(inputs.dot(&weights))
}
