/// Finite-difference gradients.
///
/// Every selected parameter value is shifted by ±ε and the primitive is
/// re-evaluated. All shifted evaluations of a batch go out as one primitive job.
use super::{
    check_epsilon, combine_distributions, BaseEstimatorGradient, BaseSamplerGradient,
    EstimatorGradientBatch, EstimatorGradientResult, SamplerGradientBatch, SamplerGradientResult,
};
use crate::primitives::{BaseEstimator, BaseSampler};
use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiniteDiffMethod {
    /// (f(θ+ε) − f(θ−ε)) / 2ε
    #[default]
    Central,
    /// (f(θ+ε) − f(θ)) / ε
    Forward,
    /// (f(θ) − f(θ−ε)) / ε
    Backward,
}

impl FiniteDiffMethod {
    /// Offsets (in units of ε) to evaluate and the matching weights (in units of 1/ε).
    fn stencil(self) -> [(f64, f64); 2] {
        match self {
            Self::Central  => [(1.0, 0.5), (-1.0, -0.5)],
            Self::Forward  => [(1.0, 1.0), (0.0, -1.0)],
            Self::Backward => [(0.0, 1.0), (-1.0, -1.0)],
        }
    }
}

impl FromStr for FiniteDiffMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "central"  => Ok(Self::Central),
            "forward"  => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            other => Err(Error::invalid_input(format!(
                "unknown finite difference method '{other}' (expected central, forward or backward)"
            ))),
        }
    }
}

/// Shifted parameter rows for one item, `stencil.len()` rows per selected parameter.
fn shifted_rows(values: &[f64], parameters: &[usize], epsilon: f64, method: FiniteDiffMethod) -> Vec<Vec<f64>> {
    let mut rows = Vec::with_capacity(parameters.len() * 2);
    for &p in parameters {
        for (offset, _) in method.stencil() {
            let mut row = values.to_vec();
            row[p] += offset * epsilon;
            rows.push(row);
        }
    }
    rows
}

// ── Estimator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FiniteDiffEstimatorGradient<E: BaseEstimator> {
    estimator: Arc<E>,
    epsilon: f64,
    method: FiniteDiffMethod,
}

impl<E: BaseEstimator> FiniteDiffEstimatorGradient<E> {
    pub fn new(estimator: E, epsilon: f64) -> Result<Self> {
        Self::with_method(estimator, epsilon, FiniteDiffMethod::Central)
    }

    pub fn with_method(estimator: E, epsilon: f64, method: FiniteDiffMethod) -> Result<Self> {
        check_epsilon(epsilon)?;
        Ok(Self { estimator: Arc::new(estimator), epsilon, method })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn finite_diff_method(&self) -> FiniteDiffMethod {
        self.method
    }
}

impl<E: BaseEstimator> BaseEstimatorGradient for FiniteDiffEstimatorGradient<E> {
    fn method(&self) -> &'static str {
        "finite_diff"
    }

    fn evaluate(&self, batch: &EstimatorGradientBatch) -> Result<EstimatorGradientResult> {
        let mut circuits = Vec::new();
        let mut observables = Vec::new();
        let mut values = Vec::new();
        for (item, observable) in batch.items.iter().zip(&batch.observables) {
            let rows = shifted_rows(&item.values, &item.parameters, self.epsilon, self.method);
            circuits.extend(std::iter::repeat(item.circuit.clone()).take(rows.len()));
            observables.extend(std::iter::repeat(observable.clone()).take(rows.len()));
            values.extend(rows);
        }
        debug!(circuits = circuits.len(), "finite difference evaluations");
        let result = self.estimator.run(circuits, observables, values)?.result()?;
        let shots = self.estimator.shots();

        let stencil = self.method.stencil();
        let mut offset = 0;
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for item in &batch.items {
            let n = item.parameters.len() * stencil.len();
            let chunk = &result.values[offset..offset + n];
            offset += n;
            gradients.push(
                chunk
                    .chunks(stencil.len())
                    .map(|fs| {
                        fs.iter().zip(stencil).map(|(f, (_, w))| f * w).sum::<f64>() / self.epsilon
                    })
                    .collect(),
            );
            metadata.push(item.metadata(shots, self.method()));
        }
        Ok(EstimatorGradientResult { gradients, metadata })
    }
}

// ── Sampler ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FiniteDiffSamplerGradient<S: BaseSampler> {
    sampler: Arc<S>,
    epsilon: f64,
    method: FiniteDiffMethod,
}

impl<S: BaseSampler> FiniteDiffSamplerGradient<S> {
    pub fn new(sampler: S, epsilon: f64) -> Result<Self> {
        Self::with_method(sampler, epsilon, FiniteDiffMethod::Central)
    }

    pub fn with_method(sampler: S, epsilon: f64, method: FiniteDiffMethod) -> Result<Self> {
        check_epsilon(epsilon)?;
        Ok(Self { sampler: Arc::new(sampler), epsilon, method })
    }
}

impl<S: BaseSampler> BaseSamplerGradient for FiniteDiffSamplerGradient<S> {
    fn method(&self) -> &'static str {
        "finite_diff"
    }

    fn evaluate(&self, batch: &SamplerGradientBatch) -> Result<SamplerGradientResult> {
        let mut circuits = Vec::new();
        let mut values = Vec::new();
        for item in &batch.items {
            let rows = shifted_rows(&item.values, &item.parameters, self.epsilon, self.method);
            circuits.extend(std::iter::repeat(item.circuit.clone()).take(rows.len()));
            values.extend(rows);
        }
        debug!(circuits = circuits.len(), "finite difference evaluations");
        let result = self.sampler.run(circuits, values)?.result()?;
        let shots = self.sampler.shots();

        let stencil = self.method.stencil();
        let mut offset = 0;
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for item in &batch.items {
            let n = item.parameters.len() * stencil.len();
            let chunk = &result.quasi_dists[offset..offset + n];
            offset += n;
            gradients.push(
                chunk
                    .chunks(stencil.len())
                    .map(|dists| {
                        combine_distributions(
                            dists.iter().zip(stencil).map(|(d, (_, w))| (d, w / self.epsilon)),
                        )
                        .with_shots(shots)
                    })
                    .collect(),
            );
            metadata.push(item.metadata(shots, self.method()));
        }
        Ok(SamplerGradientResult { gradients, metadata })
    }
}
