/// Linear-combination-of-unitaries gradients (Hadamard test).
///
/// For every gate occurrence an auxiliary qubit is appended as the new
/// highest qubit and the circuit becomes:
///
/// ```text
///   aux:  ─H─S†──●─────────────── H ─
///                │
///   sys:  ─ U_before ─P─ gate ─ U_after ──
/// ```
///
/// where P is the gate's Pauli generator. Then for a gate exp(−iφ/2·P),
///
///   ∂⟨O⟩/∂φ   = ⟨Z_aux ⊗ O⟩
///   ∂p(x)/∂φ  = p(x, aux=0) − p(x, aux=1)
///
/// and each term is weighted by the occurrence's coefficient.
use super::{
    combine_distributions, BaseEstimatorGradient, BaseSamplerGradient, EstimatorGradientBatch,
    EstimatorGradientResult, GradientItem, SamplerGradientBatch, SamplerGradientResult,
};
use crate::circuit::{Circuit, Instruction, ParameterOccurrence};
use crate::primitives::{BaseEstimator, BaseSampler, QuasiDistribution};
use crate::quantum_info::Pauli;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Hadamard-test circuit for one gate occurrence.
fn gradient_circuit(circuit: &Circuit, occurrence: &ParameterOccurrence) -> Result<Circuit> {
    let gate = &circuit.instructions()[occurrence.instruction];
    let paulis = gate.generator().ok_or_else(|| {
        Error::validation(format!("{} has no Pauli generator", gate.mnemonic()))
    })?;

    let mut wide = circuit.with_ancilla()?;
    let aux = circuit.num_qubits();
    wide.insert(occurrence.instruction, Instruction::ControlledPauli { control: aux, paulis })?;
    wide.insert(0, Instruction::Sdg(aux))?;
    wide.insert(0, Instruction::H(aux))?;
    wide.push(Instruction::H(aux))?;
    Ok(wide)
}

fn gradient_circuits(item: &GradientItem) -> Result<(Vec<ParameterOccurrence>, Vec<Circuit>)> {
    let occurrences: Vec<ParameterOccurrence> = item
        .circuit
        .parameter_occurrences()
        .into_iter()
        .filter(|occ| item.slot(occ.parameter).is_some())
        .collect();
    let circuits = occurrences
        .iter()
        .map(|occ| gradient_circuit(&item.circuit, occ))
        .collect::<Result<Vec<_>>>()?;
    Ok((occurrences, circuits))
}

// ── Estimator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LinCombEstimatorGradient<E: BaseEstimator> {
    estimator: Arc<E>,
}

impl<E: BaseEstimator> LinCombEstimatorGradient<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator: Arc::new(estimator) }
    }
}

impl<E: BaseEstimator> BaseEstimatorGradient for LinCombEstimatorGradient<E> {
    fn method(&self) -> &'static str {
        "lin_comb"
    }

    fn evaluate(&self, batch: &EstimatorGradientBatch) -> Result<EstimatorGradientResult> {
        let mut per_item = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut observables = Vec::new();
        let mut values = Vec::new();
        for (item, observable) in batch.items.iter().zip(&batch.observables) {
            let (occurrences, wide) = gradient_circuits(item)?;
            let z_observable = observable.expand(Pauli::Z);
            observables.extend(std::iter::repeat(z_observable).take(wide.len()));
            values.extend(std::iter::repeat(item.values.clone()).take(wide.len()));
            circuits.extend(wide);
            per_item.push(occurrences);
        }
        debug!(circuits = circuits.len(), "linear combination evaluations");
        let result = self.estimator.run(circuits, observables, values)?.result()?;
        let shots = self.estimator.shots();

        let mut values_iter = result.values.iter();
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, occurrences) in batch.items.iter().zip(&per_item) {
            let mut grad = vec![0.0; item.parameters.len()];
            for (occ, value) in occurrences.iter().zip(values_iter.by_ref()) {
                if let Some(slot) = item.slot(occ.parameter) {
                    grad[slot] += occ.coefficient * value;
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
pub struct LinCombSamplerGradient<S: BaseSampler> {
    sampler: Arc<S>,
}

impl<S: BaseSampler> LinCombSamplerGradient<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler: Arc::new(sampler) }
    }
}

/// Fold the auxiliary bit into a sign: p(x, aux=0) − p(x, aux=1).
fn aux_difference(dist: &QuasiDistribution, num_qubits: usize) -> QuasiDistribution {
    let system_mask = (1u64 << num_qubits) - 1;
    dist.iter()
        .map(|(k, v)| {
            let sign = if (k >> num_qubits) & 1 == 1 { -1.0 } else { 1.0 };
            (k & system_mask, sign * v)
        })
        .collect()
}

impl<S: BaseSampler> BaseSamplerGradient for LinCombSamplerGradient<S> {
    fn method(&self) -> &'static str {
        "lin_comb"
    }

    fn evaluate(&self, batch: &SamplerGradientBatch) -> Result<SamplerGradientResult> {
        let mut per_item = Vec::with_capacity(batch.items.len());
        let mut circuits = Vec::new();
        let mut values = Vec::new();
        for item in &batch.items {
            let (occurrences, wide) = gradient_circuits(item)?;
            values.extend(std::iter::repeat(item.values.clone()).take(wide.len()));
            circuits.extend(wide);
            per_item.push(occurrences);
        }
        debug!(circuits = circuits.len(), "linear combination evaluations");
        let result = self.sampler.run(circuits, values)?.result()?;
        let shots = self.sampler.shots();

        let mut dists = result.quasi_dists.iter();
        let mut gradients = Vec::with_capacity(batch.items.len());
        let mut metadata = Vec::with_capacity(batch.items.len());
        for (item, occurrences) in batch.items.iter().zip(&per_item) {
            let n = item.circuit.num_qubits();
            let mut folded: Vec<Vec<(QuasiDistribution, f64)>> = vec![Vec::new(); item.parameters.len()];
            for (occ, dist) in occurrences.iter().zip(dists.by_ref()) {
                if let Some(slot) = item.slot(occ.parameter) {
                    folded[slot].push((aux_difference(dist, n), occ.coefficient));
                }
            }
            gradients.push(
                folded
                    .iter()
                    .map(|terms| {
                        combine_distributions(terms.iter().map(|(d, c)| (d, *c))).with_shots(shots)
                    })
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
    use crate::circuit::parse_source;
    use crate::primitives::{Estimator, Sampler};
    use crate::quantum_info::SparsePauliOp;

    fn gradient(circuit: Circuit, observable: SparsePauliOp, values: Vec<f64>) -> Vec<f64> {
        LinCombEstimatorGradient::new(Estimator::new())
            .run(vec![circuit], vec![observable], vec![values], None)
            .unwrap()
            .result()
            .unwrap()
            .gradients
            .remove(0)
    }

    #[test]
    fn test_gradient_circuit_layout() {
        let qc = rx_circuit();
        let occ = qc.parameter_occurrences()[0];
        let wide = gradient_circuit(&qc, &occ).unwrap();
        assert_eq!(wide.num_qubits(), 2);
        let mnemonics: Vec<&str> = wide.instructions().iter().map(Instruction::mnemonic).collect();
        assert_eq!(mnemonics, vec!["H", "SDG", "CPAULI", "RX", "H"]);
    }

    #[test]
    fn test_single_rotation_is_exact() {
        for theta in [0.0, 0.5, 2.1, -1.3] {
            let g = gradient(rx_circuit(), z(), vec![theta]);
            assert!((g[0] + theta.sin()).abs() < TOL);
        }
    }

    #[test]
    fn test_repeated_and_scaled_parameters() {
        let theta = 0.45_f64;
        let expected = -2.0 * (2.0 * theta).sin();
        assert!((gradient(repeated_rx_circuit(), z(), vec![theta])[0] - expected).abs() < TOL);
        assert!((gradient(scaled_rx_circuit(), z(), vec![theta])[0] - expected).abs() < TOL);
    }

    #[test]
    fn test_two_qubit_rotation_gradient() {
        let (a, b) = (1.1_f64, -0.4_f64);
        let g = gradient(two_param_circuit(), z0_plus_2z1(), vec![a, b]);
        assert!((g[0] + a.sin()).abs() < TOL);
        assert!((g[1] + 2.0 * b.sin()).abs() < TOL);
    }

    #[test]
    fn test_ry_and_phase_generators() {
        // RY(θ) on |0⟩: ⟨X⟩ = sin θ
        let ry = parse_source("PARAM t\nQREG 1\nRY 0 t").unwrap();
        let x = SparsePauliOp::from_label("X").unwrap();
        let theta = 0.3_f64;
        assert!((gradient(ry, x, vec![theta])[0] - theta.cos()).abs() < TOL);

        let phase = parse_source("PARAM t\nQREG 1\nH 0\nPHASE 0 t\nH 0").unwrap();
        assert!((gradient(phase, z(), vec![theta])[0] + theta.sin()).abs() < TOL);
    }

    #[test]
    fn test_agrees_with_parameter_shift_on_entangled_circuit() {
        use crate::gradients::ParamShiftEstimatorGradient;
        let qc = parse_source(
            "PARAM a b c\nQREG 3\nRY 0 a\nCNOT 0 1\nRZX 1 2 b - a\nRX 2 3*c\nCZ 0 2\nRYY 0 2 c",
        )
        .unwrap();
        let obs = SparsePauliOp::from_real_list(&[("XZY", 0.7), ("ZIZ", -1.2), ("IYI", 0.4)]).unwrap();
        let values = vec![0.3, -0.8, 1.7];
        let lin = gradient(qc.clone(), obs.clone(), values.clone());
        let shift = ParamShiftEstimatorGradient::new(Estimator::new())
            .run(vec![qc], vec![obs], vec![values], None)
            .unwrap()
            .result()
            .unwrap()
            .gradients
            .remove(0);
        for (l, s) in lin.iter().zip(&shift) {
            assert!((l - s).abs() < TOL);
        }
    }

    #[test]
    fn test_sampler_gradient_matches_analytic() {
        let theta = 1.2_f64;
        let result = LinCombSamplerGradient::new(Sampler::new())
            .run(vec![rx_circuit()], vec![vec![theta]], None)
            .unwrap()
            .result()
            .unwrap();
        let dist = &result.gradients[0][0];
        assert!((dist.get(0) + theta.sin() / 2.0).abs() < TOL);
        assert!((dist.get(1) - theta.sin() / 2.0).abs() < TOL);
        assert!(dist.total().abs() < TOL);
        assert_eq!(result.metadata[0].method, "lin_comb");
    }
}
