use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use shapley::design::build_design;
use shapley::permutations::generate_permutations;
use shapley::progress::NoopShapleyProgress;
use shapley::sampling::{Conditioning, conditional_sampler_fn, model_fn, sampler_fn};
use shapley::{ShapleyConfig, estimate_shapley_effects};

fn normal_draws(n: usize, d: usize, rng: &mut dyn RngCore) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |_| rng.sample(StandardNormal))
}

fn configs() -> Vec<(usize, ShapleyConfig)> {
    [3_usize, 4, 5]
        .iter()
        .map(|&n_inputs| (n_inputs, ShapleyConfig::exact(n_inputs, 2_000, 40, 40)))
        .collect()
}

fn benchmark_design(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_design");
    for (n_inputs, config) in configs() {
        let Ok(layout) = config.layout() else {
            continue;
        };
        group.throughput(Throughput::Elements(layout.total_rows() as u64));

        group.bench_with_input(BenchmarkId::new("exact", n_inputs), &config, |b, config| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0x5EED_5A9 + n_inputs as u64);
                let permutations =
                    generate_permutations(config.method, config.n_inputs, None, &mut rng)
                        .unwrap();
                let mut unconditional = sampler_fn(|n: usize, rng: &mut dyn RngCore| {
                    Ok(normal_draws(n, n_inputs, rng))
                });
                let mut conditional = conditional_sampler_fn(
                    |n: usize,
                     subset: &[usize],
                     _: Option<Conditioning<'_>>,
                     rng: &mut dyn RngCore| Ok(normal_draws(n, subset.len(), rng)),
                );
                let design = build_design(
                    &layout,
                    &permutations,
                    &mut unconditional,
                    &mut conditional,
                    &mut rng,
                    &mut NoopShapleyProgress,
                )
                .unwrap();
                black_box(design);
            });
        });
    }
    group.finish();
}

fn benchmark_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_shapley_effects");
    for (n_inputs, config) in configs() {
        let model =
            model_fn(|inputs: ArrayView2<'_, f64>| Ok(inputs.map_axis(Axis(1), |row| row.sum())));

        group.bench_with_input(BenchmarkId::new("linear", n_inputs), &config, |b, config| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0x5EED_5A9);
                let mut unconditional = sampler_fn(|n: usize, rng: &mut dyn RngCore| {
                    Ok(normal_draws(n, n_inputs, rng))
                });
                let mut conditional = conditional_sampler_fn(
                    |n: usize,
                     subset: &[usize],
                     _: Option<Conditioning<'_>>,
                     rng: &mut dyn RngCore| Ok(normal_draws(n, subset.len(), rng)),
                );
                let effects = estimate_shapley_effects(
                    black_box(config),
                    &model,
                    &mut unconditional,
                    &mut conditional,
                    &mut rng,
                )
                .unwrap();
                black_box(effects);
            });
        });
    }
    group.finish();
}

criterion_group!(shapley_design, benchmark_design, benchmark_estimate);
criterion_main!(shapley_design);
