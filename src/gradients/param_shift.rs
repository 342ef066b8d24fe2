/// Parameter-shift gradients.
///
/// For a gate exp(−iφ/2·P) whose angle φ depends on θ with coefficient c,
///
///   ∂f/∂θ  +=  c · (f(φ + π/2) − f(φ − π/2)) / 2
///
/// summed over every gate the parameter appears in. The shift is applied to
/// the gate angle, not to the parameter value, so repeated parameters and
/// scaled angles are handled exactly.
use super::{
    combine_distributions, BaseEstimatorGradient, BaseSamplerGradient, EstimatorGradientBatch,
    EstimatorGradientResult, GradientItem, SamplerGradientBatch, SamplerGradientResult,
};
use crate::circuit::{Circuit, ParameterOccurrence};
use crate::primitives::{BaseEstimator, BaseSampler, QuasiDistribution};
use crate::Result;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use tracing::debug;

/// Occurrences of the selected parameters and the ±π/2 circuits for each.
fn shifted_circuits(item: &GradientItem) -> Result<(Vec<ParameterOccurrence>, Vec<Circuit>)> {
    let occurrences: Vec<ParameterOccurrence> = item
        .circuit
        .parameter_occurrences()
        .into_iter()
        .filter(|occ| item.slot(occ.parameter).is_some())
        .collect();
    let mut circuits = Vec::with_capacity(occurrences.len() * 2);
    for occ in &occurrences {
        circuits.push(item.circuit.with_angle_shift(occ.instruction, FRAC_PI_2)?);
        circuits.push(item.circuit.with_angle_shift(occ.instruction, -FRAC_PI_2)?);
    }
    Ok((occurrences, circuits))
}

// ── Estimator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ParamShiftEstimatorGradient<E: BaseEstimator> {
    estimator: Arc<E>,
}

impl<E: BaseEstimator> ParamShiftEstimatorGradient<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator: Arc::new(estimator) }
    }
}

impl<E: BaseEstimator> BaseEstimatorGradient for ParamShiftEstimatorGradient<E> {
    fn method(&self) -> &'static str {
        "param_shift"
    }

    fn evaluate(&self, batch: &EstimatorGradientBatch) -> Result<EstimatorGradientResult> {
        let mut per_item = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut observables = Vec::new();
        let mut values = Vec::new();
        for (item, observable) in batch.items.iter().zip(&batch.observables) {
            let (occurrences, shifted) = shifted_circuits(item)?;
            observables.extend(std::iter::repeat(observable.clone()).take(shifted.len()));
            values.extend(std::iter::repeat(item.values.clone()).take(shifted.len()));
            circuits.extend(shifted);
            per_item.push(occurrences);
        }
        debug!(circuits = circuits.len(), "parameter shift evaluations");
        let result = self.estimator.run(circuits, observables, values)?.result()?;
        let shots = self.estimator.shots();

        let mut offset = 0;
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, occurrences) in batch.items.iter().zip(&per_item) {
            let mut grad = vec![0.0; item.parameters.len()];
            for occ in occurrences {
                let (plus, minus) = (result.values[offset], result.values[offset + 1]);
                offset += 2;
                if let Some(slot) = item.slot(occ.parameter) {
                    grad[slot] += occ.coefficient * (plus - minus) / 2.0;
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
pub struct ParamShiftSamplerGradient<S: BaseSampler> {
    sampler: Arc<S>,
}

impl<S: BaseSampler> ParamShiftSamplerGradient<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler: Arc::new(sampler) }
    }
}

impl<S: BaseSampler> BaseSamplerGradient for ParamShiftSamplerGradient<S> {
    fn method(&self) -> &'static str {
        "param_shift"
    }

    fn evaluate(&self, batch: &SamplerGradientBatch) -> Result<SamplerGradientResult> {
        let mut per_item = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut values = Vec::new();
        for item in &batch.items {
            let (occurrences, shifted) = shifted_circuits(item)?;
            values.extend(std::iter::repeat(item.values.clone()).take(shifted.len()));
            circuits.extend(shifted);
            per_item.push(occurrences);
        }
        debug!(circuits = circuits.len(), "parameter shift evaluations");
        let result = self.sampler.run(circuits, values)?.result()?;
        let shots = self.sampler.shots();

        let mut offset = 0;
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, occurrences) in batch.items.iter().zip(&per_item) {
            let mut terms: Vec<Vec<(&QuasiDistribution, f64)>> = vec![Vec::new(); item.parameters.len()];
            for occ in occurrences {
                let (plus, minus) = (&result.quasi_dists[offset], &result.quasi_dists[offset + 1]);
                offset += 2;
                if let Some(slot) = item.slot(occ.parameter) {
                    let w = occ.coefficient / 2.0;
                    terms[slot].push((plus, w));
                    terms[slot].push((minus, -w));
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

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::circuit::{parse_source, Parameter};
    use crate::primitives::{Estimator, EstimatorOptions, Sampler, SamplerOptions};
    use crate::quantum_info::SparsePauliOp;

    fn gradient(circuit: Circuit, observable: SparsePauliOp, values: Vec<f64>) -> Vec<f64> {
        ParamShiftEstimatorGradient::new(Estimator::new())
            .run(vec![circuit], vec![observable], vec![values], None)
            .unwrap()
            .result()
            .unwrap()
            .gradients
            .remove(0)
    }

    #[test]
    fn test_single_rotation_is_exact() {
        for theta in [0.0, 0.5, 2.1, -1.3] {
            let g = gradient(rx_circuit(), z(), vec![theta]);
            assert!((g[0] + theta.sin()).abs() < TOL);
        }
    }

    #[test]
    fn test_repeated_parameter_accumulates() {
        let theta = 0.6_f64;
        let g = gradient(repeated_rx_circuit(), z(), vec![theta]);
        assert!((g[0] + 2.0 * (2.0 * theta).sin()).abs() < TOL);
    }

    #[test]
    fn test_scaled_angle_applies_chain_rule() {
        let theta = 0.6_f64;
        let g = gradient(scaled_rx_circuit(), z(), vec![theta]);
        assert!((g[0] + 2.0 * (2.0 * theta).sin()).abs() < TOL);
    }

    #[test]
    fn test_two_qubit_rotation_gradient() {
        let (a, b) = (0.3_f64, 1.4_f64);
        let g = gradient(two_param_circuit(), z0_plus_2z1(), vec![a, b]);
        assert!((g[0] + a.sin()).abs() < TOL);
        assert!((g[1] + 2.0 * b.sin()).abs() < TOL);
    }

    #[test]
    fn test_phase_gate_gradient() {
        // H, P(θ), H on |0⟩: ⟨Z⟩ = cos θ
        let qc = parse_source("PARAM t\nQREG 1\nH 0\nP 0 t\nH 0").unwrap();
        let theta = 0.8_f64;
        let g = gradient(qc, z(), vec![theta]);
        assert!((g[0] + theta.sin()).abs() < TOL);
    }

    #[test]
    fn test_empty_selection_gives_empty_gradient() {
        let result = ParamShiftEstimatorGradient::new(Estimator::new())
            .run(vec![rx_circuit()], vec![z()], vec![vec![0.2]], Some(vec![vec![]]))
            .unwrap()
            .result()
            .unwrap();
        assert!(result.gradients[0].is_empty());
        assert!(result.metadata[0].parameters.is_empty());
    }

    #[test]
    fn test_metadata_reports_primitive_shots() {
        let options = EstimatorOptions { shots: Some(100), seed: Some(4) };
        let gradient = ParamShiftEstimatorGradient::new(Estimator::with_options(options).unwrap());
        let result = gradient
            .run(
                vec![rx_circuit(), rx_circuit()],
                vec![z(), z()],
                vec![vec![0.3], vec![0.3]],
                Some(vec![vec![Parameter::new("theta")], vec![]]),
            )
            .unwrap()
            .result()
            .unwrap();
        assert_eq!(result.metadata[0].shots, Some(100));
        assert_eq!(result.metadata[1].shots, Some(100));

        // nothing selected, so the primitive batch is empty
        let result = gradient
            .run(vec![rx_circuit()], vec![z()], vec![vec![0.3]], Some(vec![vec![]]))
            .unwrap()
            .result()
            .unwrap();
        assert_eq!(result.metadata[0].shots, Some(100));

        let options = SamplerOptions { shots: Some(250), seed: Some(4) };
        let result = ParamShiftSamplerGradient::new(Sampler::with_options(options).unwrap())
            .run(vec![rx_circuit()], vec![vec![0.3]], Some(vec![vec![]]))
            .unwrap()
            .result()
            .unwrap();
        assert_eq!(result.metadata[0].shots, Some(250));
    }

    #[test]
    fn test_batch_of_circuits() {
        let thetas = [0.1_f64, 0.9];
        let result = ParamShiftEstimatorGradient::new(Estimator::new())
            .run(
                vec![rx_circuit(), scaled_rx_circuit()],
                vec![z(), z()],
                thetas.iter().map(|t| vec![*t]).collect(),
                None,
            )
            .unwrap()
            .result()
            .unwrap();
        assert!((result.gradients[0][0] + thetas[0].sin()).abs() < TOL);
        assert!((result.gradients[1][0] + 2.0 * (2.0 * thetas[1]).sin()).abs() < TOL);
    }

    #[test]
    fn test_unused_parameter_has_zero_gradient() {
        let mut qc = Circuit::new(1).unwrap();
        qc.add_parameter(Parameter::new("idle")).unwrap();
        qc.rx(0, Parameter::new("theta")).unwrap();
        let g = gradient(qc, z(), vec![5.0, 0.4]);
        assert_eq!(g[0], 0.0);
        assert!((g[1] + 0.4_f64.sin()).abs() < TOL);
    }

    #[test]
    fn test_sampler_gradient_sums_to_zero() {
        let (a, b) = (0.7_f64, 0.2_f64);
        let result = ParamShiftSamplerGradient::new(Sampler::new())
            .run(vec![two_param_circuit()], vec![vec![a, b]], None)
            .unwrap()
            .result()
            .unwrap();
        for dist in &result.gradients[0] {
            assert!(dist.total().abs() < TOL);
        }
        // marginal on qubit 0: ∂p(q0=1)/∂a = sin a / 2
        let d_a = &result.gradients[0][0];
        let dp1: f64 = d_a.iter().filter(|(k, _)| k & 1 == 1).map(|(_, v)| v).sum();
        assert!((dp1 - a.sin() / 2.0).abs() < TOL);
    }
}
