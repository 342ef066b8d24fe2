/// Measurement-distribution primitive.
///
/// Every qubit is measured at the end of the circuit; outcome `k` is the
/// basis-state index with qubit 0 as the least significant bit.
use super::job::Job;
use super::quasi::QuasiDistribution;
use crate::circuit::Circuit;
use crate::core::Simulator;
use crate::{Error, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SamplerMetadata {
    pub shots: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SamplerResult {
    pub quasi_dists: Vec<QuasiDistribution>,
    pub metadata: Vec<SamplerMetadata>,
}

/// Shot settings for `Sampler`. `shots: None` means exact probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerOptions {
    pub shots: Option<u64>,
    pub seed: Option<u64>,
}

pub fn validate_sampler_batch(circuits: &[Circuit], parameter_values: &[Vec<f64>]) -> Result<()> {
    if circuits.len() != parameter_values.len() {
        return Err(Error::invalid_input(format!(
            "batch length mismatch: {} circuit(s), {} parameter set(s)",
            circuits.len(),
            parameter_values.len()
        )));
    }
    for (i, (circuit, values)) in circuits.iter().zip(parameter_values).enumerate() {
        if values.len() != circuit.num_parameters() {
            return Err(Error::invalid_input(format!(
                "item {i}: circuit has {} parameter(s) but {} value(s) were supplied",
                circuit.num_parameters(),
                values.len()
            )));
        }
    }
    Ok(())
}

pub trait BaseSampler: Clone + Send + Sync + 'static {
    /// Shots per distribution, `None` for exact probabilities.
    fn shots(&self) -> Option<u64>;

    /// Evaluate a validated batch synchronously.
    fn evaluate(&self, circuits: &[Circuit], parameter_values: &[Vec<f64>]) -> Result<SamplerResult>;

    /// Validate the batch and evaluate it on a worker thread.
    fn run(&self, circuits: Vec<Circuit>, parameter_values: Vec<Vec<f64>>) -> Result<Job<SamplerResult>> {
        validate_sampler_batch(&circuits, &parameter_values)?;
        debug!(batch = circuits.len(), "sampler job");
        let this = self.clone();
        Ok(Job::submit(move || this.evaluate(&circuits, &parameter_values)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sampler {
    options: SamplerOptions,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SamplerOptions) -> Result<Self> {
        if options.shots == Some(0) {
            return Err(Error::invalid_input("shots must be positive"));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    fn sample_one(&self, index: usize, circuit: &Circuit, values: &[f64]) -> Result<QuasiDistribution> {
        let probabilities = Simulator::run(circuit, values)?.probabilities();
        let Some(shots) = self.options.shots else {
            return Ok(QuasiDistribution::from_dense(&probabilities, None));
        };

        let weights = WeightedIndex::new(&probabilities)
            .map_err(|e| Error::invalid_input(format!("cannot sample distribution: {e}")))?;
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };
        let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
        for _ in 0..shots {
            *counts.entry(weights.sample(&mut rng) as u64).or_insert(0) += 1;
        }
        let quasi = counts
            .into_iter()
            .map(|(k, c)| (k, c as f64 / shots as f64))
            .collect();
        Ok(QuasiDistribution::new(quasi, Some(shots)))
    }
}

impl BaseSampler for Sampler {
    fn shots(&self) -> Option<u64> {
        self.options.shots
    }

    fn evaluate(&self, circuits: &[Circuit], parameter_values: &[Vec<f64>]) -> Result<SamplerResult> {
        validate_sampler_batch(circuits, parameter_values)?;
        let quasi_dists: Vec<QuasiDistribution> = (0..circuits.len())
            .into_par_iter()
            .map(|i| self.sample_one(i, &circuits[i], &parameter_values[i]))
            .collect::<Result<_>>()?;
        let metadata = vec![SamplerMetadata { shots: self.options.shots }; circuits.len()];
        Ok(SamplerResult { quasi_dists, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{parse_source, Parameter};

    #[test]
    fn test_exact_bell_distribution() {
        let bell = parse_source("QREG 2\nH 0\nCNOT 0 1").unwrap();
        let result = Sampler::new().run(vec![bell], vec![vec![]]).unwrap().result().unwrap();
        let dist = &result.quasi_dists[0];
        assert!((dist.get(0b00) - 0.5).abs() < 1e-12);
        assert!((dist.get(0b11) - 0.5).abs() < 1e-12);
        assert_eq!(dist.get(0b01), 0.0);
    }

    #[test]
    fn test_parameterized_distribution() {
        let mut qc = Circuit::new(1).unwrap();
        qc.ry(0, Parameter::new("a")).unwrap();
        let theta = 0.8_f64;
        let result = Sampler::new().run(vec![qc], vec![vec![theta]]).unwrap().result().unwrap();
        assert!((result.quasi_dists[0].get(1) - (theta / 2.0).sin().powi(2)).abs() < 1e-12);
    }

    #[test]
    fn test_shot_sampling_is_seeded_and_normalized() {
        let qc = parse_source("QREG 2\nH 0\nH 1").unwrap();
        let sampler = Sampler::with_options(SamplerOptions { shots: Some(4000), seed: Some(11) }).unwrap();
        let run = || sampler.run(vec![qc.clone()], vec![vec![]]).unwrap().result().unwrap();
        let (a, b) = (run(), run());
        assert_eq!(a, b);
        let dist = &a.quasi_dists[0];
        assert!((dist.total() - 1.0).abs() < 1e-12);
        assert_eq!(dist.shots(), Some(4000));
        for k in 0..4 {
            assert!((dist.get(k) - 0.25).abs() < 0.05);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let qc = parse_source("QREG 1\nH 0").unwrap();
        assert!(matches!(
            Sampler::new().run(vec![qc], vec![]),
            Err(Error::InvalidInput(_))
        ));
    }
}
