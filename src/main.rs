use anyhow::{bail, Context, Result};
use astragrad::circuit::{parse_file, Circuit};
use astragrad::config::{GradientOutput, JobConfig};
use astragrad::gradients::{
    BaseEstimatorGradient, BaseSamplerGradient, EstimatorGradientResult, FiniteDiffEstimatorGradient,
    LinCombEstimatorGradient, ParamShiftEstimatorGradient, ParamShiftSamplerGradient,
    SpsaEstimatorGradient,
};
use astragrad::logging::init_logger;
use astragrad::optimizers::{GradientDescent, Optimizer, Umda};
use astragrad::primitives::{
    BaseEstimator, BaseSampler, Estimator, EstimatorOptions, Sampler, SamplerOptions,
};
use astragrad::quantum_info::SparsePauliOp;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "astragrad")]
#[command(about = "Estimator/Sampler primitives and circuit gradients on a statevector simulator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in gradient demonstrations
    Demo,

    /// Run a gradient job described by a TOML file
    Grad {
        job: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate an observable on an AQL circuit
    Estimate {
        file: PathBuf,

        /// Pauli label, qubit 0 rightmost (e.g. ZI)
        #[arg(short, long)]
        observable: String,

        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        values: Vec<f64>,

        #[arg(long)]
        shots: Option<u64>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Sample the measurement distribution of an AQL circuit
    Sample {
        file: PathBuf,

        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        values: Vec<f64>,

        #[arg(long)]
        shots: Option<u64>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Parse an AQL circuit and print it with its parameters
    Show { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.quiet)?;

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Demo => run_all_demos(),
        Commands::Grad { job, json } => cli_grad(&job, json),
        Commands::Estimate { file, observable, values, shots, seed } => {
            cli_estimate(&file, &observable, values, shots, seed)
        }
        Commands::Sample { file, values, shots, seed } => cli_sample(&file, values, shots, seed),
        Commands::Show { file } => cli_show(&file),
    }
}

// ── CLI ───────────────────────────────────────────────────────────────────

fn load_circuit(path: &Path) -> Result<Circuit> {
    parse_file(path).with_context(|| format!("cannot load circuit '{}'", path.display()))
}

fn cli_grad(path: &Path, json: bool) -> Result<()> {
    let config = JobConfig::from_file(path)
        .with_context(|| format!("invalid job file '{}'", path.display()))?;
    let output = config.run()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("━━━ astragrad gradient job ━━━━━━━━━━━━━━━━━━━━━━━");
    println!("File: {}\n", path.display());
    match output {
        GradientOutput::Estimator(result) => print_estimator_gradients(&result),
        GradientOutput::Sampler(result) => {
            for (i, (grads, meta)) in result.gradients.iter().zip(&result.metadata).enumerate() {
                println!("Item {i}  [{}]", meta.method);
                for (name, dist) in meta.parameters.iter().zip(grads) {
                    println!("  ∂p/∂{name}: {dist}");
                }
            }
        }
    }
    Ok(())
}

fn print_estimator_gradients(result: &EstimatorGradientResult) {
    for (i, (grad, meta)) in result.gradients.iter().zip(&result.metadata).enumerate() {
        println!("Item {i}  [{}]", meta.method);
        for (name, g) in meta.parameters.iter().zip(grad) {
            println!("  ∂⟨O⟩/∂{name:<8} = {g:+.6}");
        }
    }
}

fn cli_estimate(
    path: &Path,
    label: &str,
    values: Vec<f64>,
    shots: Option<u64>,
    seed: Option<u64>,
) -> Result<()> {
    let circuit = load_circuit(path)?;
    let observable = SparsePauliOp::from_label(label)?;
    let estimator = Estimator::with_options(EstimatorOptions { shots, seed })?;
    let result = estimator.run(vec![circuit], vec![observable], vec![values])?.result()?;
    println!("⟨{label}⟩ = {:.6}", result.values[0]);
    if let Some(meta) = result.metadata.first() {
        println!("variance = {:.6}", meta.variance);
    }
    Ok(())
}

fn cli_sample(path: &Path, values: Vec<f64>, shots: Option<u64>, seed: Option<u64>) -> Result<()> {
    let circuit = load_circuit(path)?;
    let num_qubits = circuit.num_qubits();
    let sampler = Sampler::with_options(SamplerOptions { shots, seed })?;
    let result = sampler.run(vec![circuit], vec![values])?.result()?;
    let Some(dist) = result.quasi_dists.first() else {
        bail!("sampler returned no distribution");
    };
    for (label, p) in dist.binary_probabilities(num_qubits) {
        println!("  |{label}⟩  {p:.6}");
    }
    Ok(())
}

fn cli_show(path: &Path) -> Result<()> {
    let circuit = load_circuit(path)?;
    println!("{circuit}");
    println!(
        "{} qubit(s) | {} gate(s) | parameters: [{}]",
        circuit.num_qubits(),
        circuit.gate_count(),
        circuit.parameter_names().join(", ")
    );
    Ok(())
}

fn print_banner() {
    println!("╔══════════════════════════════════════════════╗");
    println!("║          astragrad v{:<25}║", env!("CARGO_PKG_VERSION"));
    println!("║   Circuit gradients on statevector primitives ║");
    println!("╚══════════════════════════════════════════════╝");
    println!();
}

// ── Demos ─────────────────────────────────────────────────────────────────

const DEMO_CIRCUIT: &str = "\
PARAM a b
QREG 2
RY 0 a
H 1
RZZ 0 1 b
H 1
CNOT 0 1
";

fn run_all_demos() -> Result<()> {
    print_banner();
    demo_estimator_gradients()?;
    demo_sampler_gradient()?;
    demo_shot_noise()?;
    demo_optimizers()?;
    Ok(())
}

fn demo_estimator_gradients() -> Result<()> {
    println!("━━━ Demo 1: Estimator gradients ━━━━━━━━━━━━━━━━━━");
    let circuit = astragrad::circuit::parse_source(DEMO_CIRCUIT)?;
    let observable = SparsePauliOp::from_real_list(&[("ZZ", 1.0), ("XI", 0.5)])?;
    let values = vec![0.4, 1.3];
    println!("{circuit}");
    println!("Observable: {observable}");
    println!("Values: a = {}, b = {}\n", values[0], values[1]);

    let args = || (vec![circuit.clone()], vec![observable.clone()], vec![values.clone()]);
    let report = |name: &str, result: EstimatorGradientResult| {
        println!("  {name:<20} {:?}", round(&result.gradients[0]));
    };

    let (c, o, v) = args();
    let fd = FiniteDiffEstimatorGradient::new(Estimator::new(), 1e-6)?;
    report("finite difference", fd.run(c, o, v, None)?.result()?);

    let (c, o, v) = args();
    let shift = ParamShiftEstimatorGradient::new(Estimator::new());
    report("parameter shift", shift.run(c, o, v, None)?.result()?);

    let (c, o, v) = args();
    let lin_comb = LinCombEstimatorGradient::new(Estimator::new());
    report("linear combination", lin_comb.run(c, o, v, None)?.result()?);

    let (c, o, v) = args();
    let spsa = SpsaEstimatorGradient::new(Estimator::new(), 1e-3, 500, Some(7))?;
    report("SPSA (batch 500)", spsa.run(c, o, v, None)?.result()?);
    println!();
    Ok(())
}

fn demo_sampler_gradient() -> Result<()> {
    println!("━━━ Demo 2: Sampler gradient ━━━━━━━━━━━━━━━━━━━━━");
    let circuit = astragrad::circuit::parse_source(DEMO_CIRCUIT)?;
    let result = ParamShiftSamplerGradient::new(Sampler::new())
        .run(vec![circuit], vec![vec![0.4, 1.3]], None)?
        .result()?;
    for (name, dist) in result.metadata[0].parameters.iter().zip(&result.gradients[0]) {
        println!("  ∂p/∂{name}:");
        for (label, d) in dist.binary_probabilities(2) {
            println!("    |{label}⟩  {d:+.6}");
        }
        println!("    Σ = {:+.2e}", dist.total());
    }
    println!();
    Ok(())
}

fn demo_shot_noise() -> Result<()> {
    println!("━━━ Demo 3: Shot-based parameter shift ━━━━━━━━━━━━");
    let circuit = astragrad::circuit::parse_source("PARAM t\nQREG 1\nRX 0 t")?;
    let observable = SparsePauliOp::from_label("Z")?;
    let theta = 0.9_f64;
    println!("  exact          {:+.6}", -theta.sin());
    for shots in [100, 1_000, 10_000, 100_000] {
        let estimator = Estimator::with_options(EstimatorOptions { shots: Some(shots), seed: Some(11) })?;
        let result = ParamShiftEstimatorGradient::new(estimator)
            .run(vec![circuit.clone()], vec![observable.clone()], vec![vec![theta]], None)?
            .result()?;
        println!("  {shots:>7} shots  {:+.6}", result.gradients[0][0]);
    }
    println!();
    Ok(())
}

fn demo_optimizers() -> Result<()> {
    println!("━━━ Demo 4: Minimizing ⟨ZZ + 0.5·XI⟩ ━━━━━━━━━━━━━");
    let circuit = astragrad::circuit::parse_source(DEMO_CIRCUIT)?;
    let observable = SparsePauliOp::from_real_list(&[("ZZ", 1.0), ("XI", 0.5)])?;
    let estimator = Estimator::new();
    let gradient = ParamShiftEstimatorGradient::new(estimator.clone());

    let mut energy = |x: &[f64]| -> astragrad::Result<f64> {
        let result = estimator
            .run(vec![circuit.clone()], vec![observable.clone()], vec![x.to_vec()])?
            .result()?;
        Ok(result.values[0])
    };
    let mut jacobian = |x: &[f64]| -> astragrad::Result<Vec<f64>> {
        let mut result = gradient
            .run(vec![circuit.clone()], vec![observable.clone()], vec![x.to_vec()], None)?
            .result()?;
        Ok(result.gradients.remove(0))
    };

    let mut descent = GradientDescent::new(0.2, 200, 1e-10)?;
    let gd = descent.minimize(&mut energy, &[0.1, 0.1], Some(&mut jacobian), None)?;
    println!("  gradient descent  E = {:+.6}  x = {:?}  nfev = {}", gd.fun, round(&gd.x), gd.nfev);

    let mut umda = Umda::new(60, 30, 2)?.with_seed(5);
    let eda = umda.minimize(&mut energy, &[], None, None)?;
    println!("  UMDA              E = {:+.6}  x = {:?}  nfev = {}", eda.fun, round(&eda.x), eda.nfev);
    debug!(history = ?umda.history(), "UMDA history");
    println!();
    Ok(())
}

fn round(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v * 1e6).round() / 1e6).collect()
}
