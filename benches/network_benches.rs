use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rtrl_engine::learning::AlgorithmConfig;
use rtrl_engine::optimizer::OptimizerConfig;
use rtrl_engine::rng::Rng;
use rtrl_engine::rnn::{Rnn, RnnConfig};
use rtrl_engine::simulation::{Mode, Simulation, SimulationConfig};
use ndarray::Array2;

fn toy_rnn(n_hidden: usize, n_in: usize, n_out: usize, rng: &mut Rng) -> Rnn {
    let scale = 1.0 / (n_hidden as f64).sqrt();
    Rnn::new(
        rng.normal_mat(n_hidden, n_hidden, 0.0, scale),
        rng.normal_mat(n_hidden, n_in, 0.0, scale),
        ndarray::Array1::zeros(n_hidden),
        rng.normal_mat(n_out, n_hidden, 0.0, scale),
        ndarray::Array1::zeros(n_out),
        RnnConfig::default(),
        rng,
    )
    .unwrap()
}

fn bench_data(n_steps: usize, n_in: usize, n_out: usize, rng: &mut Rng) -> (Array2<f64>, Array2<f64>) {
    let x = Array2::from_shape_fn((n_steps, n_in), |_| rng.uniform(-1.0, 1.0));
    let y = Array2::from_shape_fn((n_steps, n_out), |_| rng.uniform(-1.0, 1.0));
    (x, y)
}

/// RTRL's per-step cost grows with `O(H^3)` in the hidden size; this bench
/// tracks that scaling against the other algorithms' cheaper updates.
fn algorithm_step_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("learning_algorithm_step");
    let n_hidden = 24;
    let n_in = 4;
    let n_out = 2;
    let n_steps = 200;

    let algorithms = [
        ("OnlyOutputWeights", AlgorithmConfig::OnlyOutputWeights),
        ("RTRL", AlgorithmConfig::Rtrl),
        ("UORO", AlgorithmConfig::Uoro),
        ("KF-RTRL", AlgorithmConfig::KfRtrl),
        ("RFLO", AlgorithmConfig::Rflo),
        ("Efficient-BPTT(10)", AlgorithmConfig::EfficientBptt { t_trunc: 10 }),
    ];

    for (label, algorithm) in algorithms {
        group.bench_with_input(BenchmarkId::from_parameter(label), &algorithm, |b, algorithm| {
            let mut rng = Rng::new(7);
            let rnn = toy_rnn(n_hidden, n_in, n_out, &mut rng);
            let (x, y) = bench_data(n_steps, n_in, n_out, &mut rng);
            let config = SimulationConfig {
                algorithm: *algorithm,
                optimizer: OptimizerConfig::Sgd { lr: 1e-4 },
                seed: 7,
                ..SimulationConfig::default()
            };
            b.iter(|| {
                let mut sim = Simulation::new(rnn.clone(), config.clone()).unwrap();
                let out = sim.run(black_box(&x), black_box(&y), Mode::Train, None).unwrap();
                black_box(out.mean_loss)
            });
        });
    }
    group.finish();
}

/// Scaling of a fixed algorithm (RTRL) over hidden size, the dimension its
/// `O(H^3)` state update is most sensitive to.
fn rtrl_hidden_size_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtrl_hidden_size");
    let n_in = 4;
    let n_out = 2;
    let n_steps = 100;

    for n_hidden in [8usize, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(n_hidden), &n_hidden, |b, &n_hidden| {
            let mut rng = Rng::new(11);
            let rnn = toy_rnn(n_hidden, n_in, n_out, &mut rng);
            let (x, y) = bench_data(n_steps, n_in, n_out, &mut rng);
            let config = SimulationConfig {
                algorithm: AlgorithmConfig::Rtrl,
                optimizer: OptimizerConfig::Sgd { lr: 1e-4 },
                seed: 11,
                ..SimulationConfig::default()
            };
            b.iter(|| {
                let mut sim = Simulation::new(rnn.clone(), config.clone()).unwrap();
                let out = sim.run(black_box(&x), black_box(&y), Mode::Train, None).unwrap();
                black_box(out.mean_loss)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, algorithm_step_cost, rtrl_hidden_size_scaling);
criterion_main!(benches);
