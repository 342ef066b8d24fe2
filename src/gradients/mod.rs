/// Gradients of primitive outputs with respect to circuit parameters.
///
/// Every method wraps a primitive and follows the same call pattern:
///
/// ```text
/// gradient.run(circuits, observables, parameter_values, parameters)
///     → Job<…GradientResult>  → result()  → gradients
/// ```
///
/// Methods:
///   - Finite difference   (central / forward / backward)
///   - Parameter shift     (±π/2 per gate occurrence)
///   - Linear combination  (auxiliary-qubit Hadamard test)
///   - SPSA                (random simultaneous perturbations)
///
/// Gradients are reported per circuit, in parameter-table order restricted to
/// the selected parameters.
pub mod finite_diff;
pub mod lin_comb;
pub mod param_shift;
pub mod spsa;

pub use finite_diff::{FiniteDiffEstimatorGradient, FiniteDiffMethod, FiniteDiffSamplerGradient};
pub use lin_comb::{LinCombEstimatorGradient, LinCombSamplerGradient};
pub use param_shift::{ParamShiftEstimatorGradient, ParamShiftSamplerGradient};
pub use spsa::{SpsaEstimatorGradient, SpsaSamplerGradient};

use crate::circuit::{Circuit, Parameter};
use crate::primitives::estimator::validate_estimator_batch;
use crate::primitives::sampler::validate_sampler_batch;
use crate::primitives::{Job, QuasiDistribution};
use crate::quantum_info::SparsePauliOp;
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

// ── Results ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientMetadata {
    /// Names of the differentiated parameters, in gradient order.
    pub parameters: Vec<String>,
    pub shots: Option<u64>,
    pub method: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatorGradientResult {
    /// `gradients[i][j]` = ∂⟨O_i⟩/∂θ_j for circuit `i`.
    pub gradients: Vec<Vec<f64>>,
    pub metadata: Vec<GradientMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplerGradientResult {
    /// `gradients[i][j]` maps each outcome x to ∂p_i(x)/∂θ_j.
    pub gradients: Vec<Vec<QuasiDistribution>>,
    pub metadata: Vec<GradientMetadata>,
}

// ── Validated batches ─────────────────────────────────────────────────────

/// One circuit of a gradient batch with its selection resolved to indices.
#[derive(Debug, Clone)]
pub struct GradientItem {
    pub circuit: Circuit,
    pub values: Vec<f64>,
    /// Selected parameter-table indices, ascending.
    pub parameters: Vec<usize>,
}

impl GradientItem {
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|&p| self.circuit.parameters()[p].name().to_string())
            .collect()
    }

    /// Position of parameter-table index `param` in this item's gradient.
    pub fn slot(&self, param: usize) -> Option<usize> {
        self.parameters.iter().position(|&p| p == param)
    }

    pub fn metadata(&self, shots: Option<u64>, method: &'static str) -> GradientMetadata {
        GradientMetadata { parameters: self.parameter_names(), shots, method }
    }
}

#[derive(Debug, Clone)]
pub struct EstimatorGradientBatch {
    pub items: Vec<GradientItem>,
    pub observables: Vec<SparsePauliOp>,
}

impl EstimatorGradientBatch {
    pub fn new(
        circuits: Vec<Circuit>,
        observables: Vec<SparsePauliOp>,
        parameter_values: Vec<Vec<f64>>,
        parameters: Option<Vec<Vec<Parameter>>>,
    ) -> Result<Self> {
        validate_estimator_batch(&circuits, &observables, &parameter_values)?;
        let items = resolve_items(circuits, parameter_values, parameters)?;
        Ok(Self { items, observables })
    }
}

#[derive(Debug, Clone)]
pub struct SamplerGradientBatch {
    pub items: Vec<GradientItem>,
}

impl SamplerGradientBatch {
    pub fn new(
        circuits: Vec<Circuit>,
        parameter_values: Vec<Vec<f64>>,
        parameters: Option<Vec<Vec<Parameter>>>,
    ) -> Result<Self> {
        validate_sampler_batch(&circuits, &parameter_values)?;
        let items = resolve_items(circuits, parameter_values, parameters)?;
        Ok(Self { items })
    }
}

fn resolve_items(
    circuits: Vec<Circuit>,
    parameter_values: Vec<Vec<f64>>,
    parameters: Option<Vec<Vec<Parameter>>>,
) -> Result<Vec<GradientItem>> {
    let selections: Vec<Option<Vec<Parameter>>> = match parameters {
        None => vec![None; circuits.len()],
        Some(sel) if sel.len() == circuits.len() => sel.into_iter().map(Some).collect(),
        Some(sel) => {
            return Err(Error::invalid_input(format!(
                "{} parameter selection(s) for {} circuit(s)",
                sel.len(),
                circuits.len()
            )))
        }
    };

    circuits
        .into_iter()
        .zip(parameter_values)
        .zip(selections)
        .enumerate()
        .map(|(i, ((circuit, values), selection))| {
            let parameters = match selection {
                None => (0..circuit.num_parameters()).collect(),
                Some(sel) => {
                    let mut indices = Vec::with_capacity(sel.len());
                    for param in &sel {
                        let index = circuit.parameter_index(param).ok_or_else(|| {
                            Error::invalid_input(format!(
                                "item {i}: parameter '{param}' is not in the circuit"
                            ))
                        })?;
                        indices.push(index);
                    }
                    indices.sort_unstable();
                    indices.dedup();
                    indices
                }
            };
            Ok(GradientItem { circuit, values, parameters })
        })
        .collect()
}

// ── Gradient traits ───────────────────────────────────────────────────────

pub trait BaseEstimatorGradient: Clone + Send + Sync + 'static {
    /// Short method name recorded in result metadata.
    fn method(&self) -> &'static str;

    /// Compute gradients for a validated batch synchronously.
    fn evaluate(&self, batch: &EstimatorGradientBatch) -> Result<EstimatorGradientResult>;

    /// Validate inputs and compute gradients on a worker thread.
    ///
    /// `parameters` selects, per circuit, which parameters to differentiate;
    /// `None` means all of them.
    fn run(
        &self,
        circuits: Vec<Circuit>,
        observables: Vec<SparsePauliOp>,
        parameter_values: Vec<Vec<f64>>,
        parameters: Option<Vec<Vec<Parameter>>>,
    ) -> Result<Job<EstimatorGradientResult>> {
        let batch = EstimatorGradientBatch::new(circuits, observables, parameter_values, parameters)?;
        debug!(method = self.method(), batch = batch.items.len(), "estimator gradient job");
        let this = self.clone();
        Ok(Job::submit(move || this.evaluate(&batch)))
    }
}

pub trait BaseSamplerGradient: Clone + Send + Sync + 'static {
    /// Short method name recorded in result metadata.
    fn method(&self) -> &'static str;

    /// Compute gradients for a validated batch synchronously.
    fn evaluate(&self, batch: &SamplerGradientBatch) -> Result<SamplerGradientResult>;

    /// Validate inputs and compute gradients on a worker thread.
    fn run(
        &self,
        circuits: Vec<Circuit>,
        parameter_values: Vec<Vec<f64>>,
        parameters: Option<Vec<Vec<Parameter>>>,
    ) -> Result<Job<SamplerGradientResult>> {
        let batch = SamplerGradientBatch::new(circuits, parameter_values, parameters)?;
        debug!(method = self.method(), batch = batch.items.len(), "sampler gradient job");
        let this = self.clone();
        Ok(Job::submit(move || this.evaluate(&batch)))
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────

/// `Σ weight · dist` over the given terms, keyed on the union of outcomes.
pub(crate) fn combine_distributions<'a>(
    terms: impl IntoIterator<Item = (&'a QuasiDistribution, f64)>,
) -> QuasiDistribution {
    terms
        .into_iter()
        .flat_map(|(dist, weight)| dist.iter().map(move |(k, v)| (k, weight * v)))
        .collect()
}

pub(crate) fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_input(format!("epsilon must be positive, got {epsilon}")))
    }
}
