/// Simultaneous-perturbation stochastic approximation (SPSA) gradients.
///
/// Each of `batch_size` samples draws a Rademacher direction Δ ∈ {−1, +1}ⁿ
/// over the selected parameters and evaluates the primitive at θ ± εΔ:
///
///   gᵢ ≈ mean_b [ (f(θ + εΔ_b) − f(θ − εΔ_b)) / 2ε · Δ_b,i ]
///
/// Two evaluations per sample regardless of the parameter count.
use super::{
    check_epsilon, combine_distributions, BaseEstimatorGradient, BaseSamplerGradient,
    EstimatorGradientBatch, EstimatorGradientResult, GradientItem, SamplerGradientBatch,
    SamplerGradientResult,
};
use crate::primitives::{BaseEstimator, BaseSampler};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// Perturbation settings shared by both SPSA gradients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpsaSettings {
    pub epsilon: f64,
    pub batch_size: usize,
    pub seed: Option<u64>,
}

impl SpsaSettings {
    pub fn new(epsilon: f64, batch_size: usize, seed: Option<u64>) -> Result<Self> {
        check_epsilon(epsilon)?;
        if batch_size == 0 {
            return Err(Error::invalid_input("SPSA batch_size must be at least 1"));
        }
        Ok(Self { epsilon, batch_size, seed })
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// `batch_size` directions for `item`, each as (θ+εΔ, θ−εΔ, Δ over the selection).
    fn perturbations(&self, item: &GradientItem, rng: &mut StdRng) -> Vec<(Vec<f64>, Vec<f64>, Vec<f64>)> {
        (0..self.batch_size)
            .map(|_| {
                let delta: Vec<f64> = item
                    .parameters
                    .iter()
                    .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                    .collect();
                let mut plus = item.values.clone();
                let mut minus = item.values.clone();
                for (&p, d) in item.parameters.iter().zip(&delta) {
                    plus[p] += self.epsilon * d;
                    minus[p] -= self.epsilon * d;
                }
                (plus, minus, delta)
            })
            .collect()
    }
}

// ── Estimator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SpsaEstimatorGradient<E: BaseEstimator> {
    estimator: Arc<E>,
    settings: SpsaSettings,
}

impl<E: BaseEstimator> SpsaEstimatorGradient<E> {
    pub fn new(estimator: E, epsilon: f64, batch_size: usize, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            estimator: Arc::new(estimator),
            settings: SpsaSettings::new(epsilon, batch_size, seed)?,
        })
    }
}

impl<E: BaseEstimator> BaseEstimatorGradient for SpsaEstimatorGradient<E> {
    fn method(&self) -> &'static str {
        "spsa"
    }

    fn evaluate(&self, batch: &EstimatorGradientBatch) -> Result<EstimatorGradientResult> {
        let mut rng = self.settings.rng();
        let mut deltas = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut observables = Vec::new();
        let mut values = Vec::new();
        for (item, observable) in batch.items.iter().zip(&batch.observables) {
            let mut item_deltas = Vec::with_capacity(self.settings.batch_size);
            for (plus, minus, delta) in self.settings.perturbations(item, &mut rng) {
                circuits.extend([item.circuit.clone(), item.circuit.clone()]);
                observables.extend([observable.clone(), observable.clone()]);
                values.extend([plus, minus]);
                item_deltas.push(delta);
            }
            deltas.push(item_deltas);
        }
        debug!(circuits = circuits.len(), "SPSA evaluations");
        let result = self.estimator.run(circuits, observables, values)?.result()?;
        let shots = self.estimator.shots();

        let eps = self.settings.epsilon;
        let samples = self.settings.batch_size as f64;
        let mut pairs = result.values.chunks(2);
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, item_deltas) in batch.items.iter().zip(&deltas) {
            let mut grad = vec![0.0; item.parameters.len()];
            for (delta, pair) in item_deltas.iter().zip(pairs.by_ref()) {
                let slope = (pair[0] - pair[1]) / (2.0 * eps);
                for (g, d) in grad.iter_mut().zip(delta) {
                    *g += slope * d / samples;
                }
            }
            gradients.push(grad);
            metadata.push(item.metadata(shots, self.method()));
        }
        Ok(EstimatorGradientResult { gradients, metadata })
    }
}

// ── Sampler ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SpsaSamplerGradient<S: BaseSampler> {
    sampler: Arc<S>,
    settings: SpsaSettings,
}

impl<S: BaseSampler> SpsaSamplerGradient<S> {
    pub fn new(sampler: S, epsilon: f64, batch_size: usize, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            sampler: Arc::new(sampler),
            settings: SpsaSettings::new(epsilon, batch_size, seed)?,
        })
    }
}

impl<S: BaseSampler> BaseSamplerGradient for SpsaSamplerGradient<S> {
    fn method(&self) -> &'static str {
        "spsa"
    }

    fn evaluate(&self, batch: &SamplerGradientBatch) -> Result<SamplerGradientResult> {
        let mut rng = self.settings.rng();
        let mut deltas = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut values = Vec::new();
        for item in &batch.items {
            let mut item_deltas = Vec::with_capacity(self.settings.batch_size);
            for (plus, minus, delta) in self.settings.perturbations(item, &mut rng) {
                circuits.extend([item.circuit.clone(), item.circuit.clone()]);
                values.extend([plus, minus]);
                item_deltas.push(delta);
            }
            deltas.push(item_deltas);
        }
        debug!(circuits = circuits.len(), "SPSA evaluations");
        let result = self.sampler.run(circuits, values)?.result()?;
        let shots = self.sampler.shots();

        let scale = 1.0 / (2.0 * self.settings.epsilon * self.settings.batch_size as f64);
        let mut pairs = result.quasi_dists.chunks(2);
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, item_deltas) in batch.items.iter().zip(&deltas) {
            let mut terms = vec![Vec::new(); item.parameters.len()];
            for (delta, pair) in item_deltas.iter().zip(pairs.by_ref()) {
                for (slot, d) in delta.iter().enumerate() {
                    terms[slot].push((&pair[0], scale * d));
                    terms[slot].push((&pair[1], -scale * d));
                }
            }
            gradients.push(
                terms
                    .into_iter()
                    .map(|t| combine_distributions(t).with_shots(shots))
                    .collect(),
            );
            metadata.push(item.metadata(shots, self.method()));
        }
        Ok(SamplerGradientResult { gradients, metadata })
    }
}
