/// Statevector execution of parameterized circuits.
///
/// `Simulator` owns a `StateVector` and applies `Instruction`s to it with a
/// bound set of parameter values. It handles:
///   - Fixed gates (H, X, Y, Z, S, Sdg, T, SX, CNOT, CZ, SWAP, Toffoli)
///   - Rotations, single-qubit via 2×2 matrices and multi-qubit via
///     Pauli-string exponentials
///   - Controlled Pauli strings
///   - State inspection and pretty-printing
use super::gates::{
    self, apply_cnot, apply_controlled_pauli, apply_cz, apply_pauli_rotation,
    apply_single_qubit_gate, apply_swap, apply_toffoli,
};
use super::state::StateVector;
use crate::circuit::{Circuit, Instruction};
use crate::quantum_info::PauliMasks;
use crate::{Error, Result};
use std::fmt;
use tracing::trace;

pub struct Simulator {
    pub state: StateVector,
}

impl Simulator {
    /// Create a new simulator for `num_qubits` qubits, initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Result<Self> {
        Ok(Self { state: StateVector::new(num_qubits)? })
    }

    /// Number of qubits in this simulator.
    pub fn num_qubits(&self) -> usize {
        self.state.num_qubits
    }

    /// Run `circuit` from |0…0⟩ with `values` bound in parameter-table order.
    pub fn run(circuit: &Circuit, values: &[f64]) -> Result<StateVector> {
        if values.len() != circuit.num_parameters() {
            return Err(Error::invalid_input(format!(
                "circuit has {} parameter(s) but {} value(s) were supplied",
                circuit.num_parameters(),
                values.len()
            )));
        }
        let mut sim = Self::new(circuit.num_qubits())?;
        for instr in circuit.instructions() {
            sim.execute(instr, values)?;
        }
        trace!(
            qubits = circuit.num_qubits(),
            gates = circuit.gate_count(),
            "circuit simulated"
        );
        Ok(sim.state)
    }

    /// Apply one instruction with parameters bound from `values`.
    pub fn execute(&mut self, instr: &Instruction, values: &[f64]) -> Result<()> {
        for q in instr.qubits() {
            if q >= self.num_qubits() {
                return Err(Error::validation(format!(
                    "{}: qubit {q} out of range for {} qubit(s)",
                    instr.mnemonic(),
                    self.num_qubits()
                )));
            }
        }
        if let Some(angle) = instr.angle() {
            if let Some((i, _)) = angle.terms().iter().find(|(i, _)| *i >= values.len()) {
                return Err(Error::invalid_input(format!(
                    "{}: no value bound for parameter index {i}",
                    instr.mnemonic()
                )));
            }
        }

        let state = &mut self.state;
        match instr {
            // ── Fixed single-qubit gates ───────────────────────────────
            Instruction::H(q)   => apply_single_qubit_gate(state, &gates::hadamard(), *q),
            Instruction::X(q)   => apply_single_qubit_gate(state, &gates::pauli_x(), *q),
            Instruction::Y(q)   => apply_single_qubit_gate(state, &gates::pauli_y(), *q),
            Instruction::Z(q)   => apply_single_qubit_gate(state, &gates::pauli_z(), *q),
            Instruction::S(q)   => apply_single_qubit_gate(state, &gates::s_gate(), *q),
            Instruction::Sdg(q) => apply_single_qubit_gate(state, &gates::sdg_gate(), *q),
            Instruction::T(q)   => apply_single_qubit_gate(state, &gates::t_gate(), *q),
            Instruction::Sx(q)  => apply_single_qubit_gate(state, &gates::sx_gate(), *q),

            // ── Single-qubit rotations ─────────────────────────────────
            Instruction::Rx { qubit, angle } => {
                apply_single_qubit_gate(state, &gates::rx(angle.evaluate(values)), *qubit)
            }
            Instruction::Ry { qubit, angle } => {
                apply_single_qubit_gate(state, &gates::ry(angle.evaluate(values)), *qubit)
            }
            Instruction::Rz { qubit, angle } => {
                apply_single_qubit_gate(state, &gates::rz(angle.evaluate(values)), *qubit)
            }
            Instruction::Phase { qubit, angle } => {
                apply_single_qubit_gate(state, &gates::phase_gate(angle.evaluate(values)), *qubit)
            }

            // ── Two-qubit rotations: exp(−iθ/2 · P) ────────────────────
            Instruction::Rxx { angle, .. }
            | Instruction::Ryy { angle, .. }
            | Instruction::Rzz { angle, .. }
            | Instruction::Rzx { angle, .. } => {
                let generator = instr.generator().unwrap_or_default();
                let masks = PauliMasks::from_sparse(&generator);
                apply_pauli_rotation(state, &masks, angle.evaluate(values));
            }

            // ── Multi-qubit gates ──────────────────────────────────────
            Instruction::Cnot { control, target } => apply_cnot(state, *control, *target),
            Instruction::Cz { control, target }   => apply_cz(state, *control, *target),
            Instruction::Swap { qubit_a, qubit_b } => apply_swap(state, *qubit_a, *qubit_b),
            Instruction::Toffoli { control0, control1, target } => {
                apply_toffoli(state, *control0, *control1, *target)
            }
            Instruction::ControlledPauli { control, paulis } => {
                apply_controlled_pauli(state, *control, &PauliMasks::from_sparse(paulis))
            }

            Instruction::Barrier => {}
        }
        Ok(())
    }

    /// Probability of each computational basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.state.probabilities()
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{parse_source, Parameter};
    use std::f64::consts::{FRAC_1_SQRT_2, PI};

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_bell_state() {
        let mut qc = Circuit::new(2).unwrap();
        qc.h(0).unwrap().cnot(0, 1).unwrap();
        let state = Simulator::run(&qc, &[]).unwrap();
        assert!((state.probability(0b00) - 0.5).abs() < EPSILON);
        assert!((state.probability(0b11) - 0.5).abs() < EPSILON);
        assert!(state.probability(0b01).abs() < EPSILON);
    }

    #[test]
    fn test_bound_rotation_matches_fixed_rotation() {
        let theta = Parameter::new("theta");
        let mut bound = Circuit::new(1).unwrap();
        bound.ry(0, &theta).unwrap();
        let mut fixed = Circuit::new(1).unwrap();
        fixed.ry(0, 0.7).unwrap();
        let a = Simulator::run(&bound, &[0.7]).unwrap();
        let b = Simulator::run(&fixed, &[]).unwrap();
        for (x, y) in a.amplitudes.iter().zip(&b.amplitudes) {
            assert!((x - y).norm() < EPSILON);
        }
    }

    #[test]
    fn test_value_count_mismatch() {
        let mut qc = Circuit::new(1).unwrap();
        qc.rx(0, Parameter::new("a")).unwrap();
        assert!(matches!(Simulator::run(&qc, &[]), Err(Error::InvalidInput(_))));
        assert!(matches!(Simulator::run(&qc, &[0.1, 0.2]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rxx_pi_flips_both_qubits() {
        let qc = parse_source("QREG 2\nRXX 0 1 PI").unwrap();
        let state = Simulator::run(&qc, &[]).unwrap();
        assert!((state.probability(0b11) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_rzz_phases() {
        // |++⟩ under RZZ(π) picks up relative phases; ⟨XX⟩ stays 1
        let mut qc = Circuit::new(2).unwrap();
        qc.h(0).unwrap().h(1).unwrap().rzz(0, 1, PI).unwrap().h(0).unwrap().h(1).unwrap();
        let state = Simulator::run(&qc, &[]).unwrap();
        assert!((state.probability(0b11) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_controlled_pauli_acts_only_when_control_set() {
        let qc = parse_source("QREG 2\nCPAULI 1 X0").unwrap();
        let idle = Simulator::run(&qc, &[]).unwrap();
        assert!((idle.probability(0) - 1.0).abs() < EPSILON);

        let qc = parse_source("QREG 2\nX 1\nCPAULI 1 X0").unwrap();
        let fired = Simulator::run(&qc, &[]).unwrap();
        assert!((fired.probability(0b11) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_sx_squared_is_x() {
        let qc = parse_source("QREG 1\nSX 0\nSX 0").unwrap();
        let state = Simulator::run(&qc, &[]).unwrap();
        assert!((state.probability(1) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_hadamard_amplitudes() {
        let qc = parse_source("QREG 1\nH 0").unwrap();
        let state = Simulator::run(&qc, &[]).unwrap();
        assert!((state.amplitudes[0].re - FRAC_1_SQRT_2).abs() < EPSILON);
        assert!((state.amplitudes[1].re - FRAC_1_SQRT_2).abs() < EPSILON);
    }
}
