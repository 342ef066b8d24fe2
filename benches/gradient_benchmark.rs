/// astragrad Criterion benchmark suite
///
/// Covers:
///   - Simulator throughput on layered parameterized circuits
///   - Exact Estimator batches (rayon-parallel)
///   - Gradient methods on the same circuit and observable
///   - AQL front-end (lex → parse)
use astragrad::circuit::{parse_source, Circuit, Parameter};
use astragrad::core::Simulator;
use astragrad::gradients::{
    BaseEstimatorGradient, FiniteDiffEstimatorGradient, LinCombEstimatorGradient,
    ParamShiftEstimatorGradient, SpsaEstimatorGradient,
};
use astragrad::primitives::{BaseEstimator, Estimator};
use astragrad::quantum_info::SparsePauliOp;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `layers` of RY on every qubit followed by an RZZ ladder; one parameter per gate.
fn layered_circuit(n: usize, layers: usize) -> Circuit {
    let mut qc = Circuit::new(n).unwrap();
    for l in 0..layers {
        for q in 0..n {
            qc.ry(q, Parameter::new(format!("y{l}_{q}"))).unwrap();
        }
        for q in 0..n - 1 {
            qc.rzz(q, q + 1, Parameter::new(format!("z{l}_{q}"))).unwrap();
        }
    }
    qc
}

fn zz_chain(n: usize) -> SparsePauliOp {
    let labels: Vec<String> = (0..n - 1)
        .map(|q| {
            (0..n)
                .rev()
                .map(|i| if i == q || i == q + 1 { 'Z' } else { 'I' })
                .collect()
        })
        .collect();
    let terms: Vec<(&str, f64)> = labels.iter().map(|l| (l.as_str(), 1.0)).collect();
    SparsePauliOp::from_real_list(&terms).unwrap()
}

fn values_for(qc: &Circuit) -> Vec<f64> {
    (0..qc.num_parameters()).map(|i| 0.1 * i as f64 + 0.05).collect()
}

// ── Simulator ─────────────────────────────────────────────────────────────

fn bench_simulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulator_layered");
    for n in [4usize, 8, 12, 16] {
        let qc = layered_circuit(n, 3);
        let values = values_for(&qc);
        group.bench_with_input(BenchmarkId::new("run", n), &n, |b, _| {
            b.iter(|| Simulator::run(black_box(&qc), black_box(&values)).unwrap());
        });
    }
    group.finish();
}

// ── Estimator ─────────────────────────────────────────────────────────────

fn bench_estimator_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator_batch");
    let n = 8;
    let qc = layered_circuit(n, 2);
    let obs = zz_chain(n);
    let values = values_for(&qc);
    for batch in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("items", batch), &batch, |b, &batch| {
            b.iter(|| {
                Estimator::new()
                    .run(vec![qc.clone(); batch], vec![obs.clone(); batch], vec![values.clone(); batch])
                    .unwrap()
                    .result()
                    .unwrap()
            });
        });
    }
    group.finish();
}

// ── Gradients ─────────────────────────────────────────────────────────────

fn bench_gradient_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator_gradient");
    group.sample_size(20);
    let n = 6;
    let qc = layered_circuit(n, 2);
    let obs = zz_chain(n);
    let values = values_for(&qc);
    let inputs = || (vec![qc.clone()], vec![obs.clone()], vec![values.clone()]);

    let fd = FiniteDiffEstimatorGradient::new(Estimator::new(), 1e-6).unwrap();
    group.bench_function("finite_diff", |b| {
        b.iter(|| {
            let (c, o, v) = inputs();
            fd.run(c, o, v, None).unwrap().result().unwrap()
        })
    });

    let shift = ParamShiftEstimatorGradient::new(Estimator::new());
    group.bench_function("param_shift", |b| {
        b.iter(|| {
            let (c, o, v) = inputs();
            shift.run(c, o, v, None).unwrap().result().unwrap()
        })
    });

    let lin_comb = LinCombEstimatorGradient::new(Estimator::new());
    group.bench_function("lin_comb", |b| {
        b.iter(|| {
            let (c, o, v) = inputs();
            lin_comb.run(c, o, v, None).unwrap().result().unwrap()
        })
    });

    let spsa = SpsaEstimatorGradient::new(Estimator::new(), 1e-2, 10, Some(1)).unwrap();
    group.bench_function("spsa_batch10", |b| {
        b.iter(|| {
            let (c, o, v) = inputs();
            spsa.run(c, o, v, None).unwrap().result().unwrap()
        })
    });
    group.finish();
}

// ── AQL front-end ─────────────────────────────────────────────────────────

fn bench_parse(c: &mut Criterion) {
    let source = "\
PARAM a b c
QREG 3
RY 0 a
RY 1 b
RY 2 c
RZZ 0 1 2*a - b
RZX 1 2 c/2 + PI_4
CNOT 0 2
RXX 0 2 a + b + c
";
    c.bench_function("aql_parse_3q", |b| b.iter(|| parse_source(black_box(source)).unwrap()));
}

criterion_group!(simulation_benches, bench_simulator, bench_estimator_batch);
criterion_group!(gradient_benches, bench_gradient_methods);
criterion_group!(frontend_benches, bench_parse);
criterion_main!(simulation_benches, gradient_benches, frontend_benches);
