/// Quantum gate definitions and application logic.
///
/// Single-qubit gates are 2×2 complex matrices applied by pairing up basis
/// states that differ only in the target qubit, O(2^n) per gate.
///
/// Parameterized multi-qubit rotations are applied through their Pauli
/// generator instead of a dense matrix:
///
/// ```text
/// exp(−iθ/2 · P) |ψ⟩ = cos(θ/2) |ψ⟩ − i·sin(θ/2) · P|ψ⟩
/// ```
use super::state::StateVector;
use crate::quantum_info::PauliMasks;
use num_complex::Complex64;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// A 2×2 complex unitary matrix representing a single-qubit gate.
/// Row-major: matrix[row][col]
pub type Matrix2x2 = [[Complex64; 2]; 2];

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

// ── Standard Gate Matrices ─────────────────────────────────────────────────

/// H = (1/√2) * [[1, 1], [1, -1]]
pub fn hadamard() -> Matrix2x2 {
    let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
    [[h, h], [h, -h]]
}

pub fn pauli_x() -> Matrix2x2 {
    [[ZERO, ONE], [ONE, ZERO]]
}

pub fn pauli_y() -> Matrix2x2 {
    [[ZERO, -I], [I, ZERO]]
}

pub fn pauli_z() -> Matrix2x2 {
    [[ONE, ZERO], [ZERO, -ONE]]
}

/// S = [[1, 0], [0, i]]
pub fn s_gate() -> Matrix2x2 {
    [[ONE, ZERO], [ZERO, I]]
}

/// S† = [[1, 0], [0, −i]]
pub fn sdg_gate() -> Matrix2x2 {
    [[ONE, ZERO], [ZERO, -I]]
}

/// T = [[1, 0], [0, e^(iπ/4)]]
pub fn t_gate() -> Matrix2x2 {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, PI / 4.0)]]
}

/// √X = ½ [[1+i, 1−i], [1−i, 1+i]]
pub fn sx_gate() -> Matrix2x2 {
    let p = Complex64::new(0.5, 0.5);
    let m = Complex64::new(0.5, -0.5);
    [[p, m], [m, p]]
}

/// Rx(θ) = [[cos(θ/2), -i·sin(θ/2)], [-i·sin(θ/2), cos(θ/2)]]
pub fn rx(theta: f64) -> Matrix2x2 {
    let cos = Complex64::new((theta / 2.0).cos(), 0.0);
    let i_sin = Complex64::new(0.0, -(theta / 2.0).sin());
    [[cos, i_sin], [i_sin, cos]]
}

/// Ry(θ) = [[cos(θ/2), -sin(θ/2)], [sin(θ/2), cos(θ/2)]]
pub fn ry(theta: f64) -> Matrix2x2 {
    let cos = Complex64::new((theta / 2.0).cos(), 0.0);
    let sin = Complex64::new((theta / 2.0).sin(), 0.0);
    [[cos, -sin], [sin, cos]]
}

/// Rz(θ) = [[e^(-iθ/2), 0], [0, e^(iθ/2)]]
pub fn rz(theta: f64) -> Matrix2x2 {
    [
        [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
        [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
    ]
}

/// P(θ) = [[1, 0], [0, e^(iθ)]]
pub fn phase_gate(theta: f64) -> Matrix2x2 {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, theta)]]
}

// ── Gate Application ───────────────────────────────────────────────────────

/// Apply a single-qubit gate to `target` qubit in the state vector.
pub fn apply_single_qubit_gate(state: &mut StateVector, gate: &Matrix2x2, target: usize) {
    assert!(target < state.num_qubits, "target qubit out of range");

    let target_mask = 1 << target;
    for i0 in 0..state.dim() {
        if i0 & target_mask != 0 {
            continue;
        }
        let i1 = i0 | target_mask;
        let a0 = state.amplitudes[i0];
        let a1 = state.amplitudes[i1];
        state.amplitudes[i0] = gate[0][0] * a0 + gate[0][1] * a1;
        state.amplitudes[i1] = gate[1][0] * a0 + gate[1][1] * a1;
    }
}

/// Flip `target` when `control` is |1⟩.
pub fn apply_cnot(state: &mut StateVector, control: usize, target: usize) {
    assert!(control < state.num_qubits, "control qubit out of range");
    assert!(target < state.num_qubits, "target qubit out of range");
    assert_ne!(control, target, "control and target must be different qubits");

    let control_mask = 1 << control;
    let target_mask = 1 << target;
    for i in 0..state.dim() {
        if (i & control_mask != 0) && (i & target_mask == 0) {
            state.amplitudes.swap(i, i | target_mask);
        }
    }
}

/// Phase flip on |11⟩ of (`control`, `target`).
pub fn apply_cz(state: &mut StateVector, control: usize, target: usize) {
    assert!(control < state.num_qubits, "control qubit out of range");
    assert!(target < state.num_qubits, "target qubit out of range");
    assert_ne!(control, target, "control and target must be different qubits");

    let mask = (1 << control) | (1 << target);
    for i in 0..state.dim() {
        if i & mask == mask {
            state.amplitudes[i] = -state.amplitudes[i];
        }
    }
}

pub fn apply_swap(state: &mut StateVector, qubit_a: usize, qubit_b: usize) {
    assert!(qubit_a < state.num_qubits, "qubit_a out of range");
    assert!(qubit_b < state.num_qubits, "qubit_b out of range");
    assert_ne!(qubit_a, qubit_b, "SWAP requires two different qubits");

    let mask_a = 1 << qubit_a;
    let mask_b = 1 << qubit_b;
    for i in 0..state.dim() {
        // visit each differing pair once: bit_a = 1, bit_b = 0
        if (i & mask_a != 0) && (i & mask_b == 0) {
            let j = (i & !mask_a) | mask_b;
            state.amplitudes.swap(i, j);
        }
    }
}

/// Toffoli (CCX): flip `target` when both controls are |1⟩.
pub fn apply_toffoli(state: &mut StateVector, control0: usize, control1: usize, target: usize) {
    assert!(control0 < state.num_qubits && control1 < state.num_qubits && target < state.num_qubits);
    assert!(control0 != control1 && control0 != target && control1 != target);

    let controls = (1 << control0) | (1 << control1);
    let t_mask = 1 << target;
    for i in 0..state.dim() {
        if (i & controls == controls) && (i & t_mask == 0) {
            state.amplitudes.swap(i, i | t_mask);
        }
    }
}

/// exp(−iθ/2 · P) for the Pauli string described by `masks`.
pub fn apply_pauli_rotation(state: &mut StateVector, masks: &PauliMasks, theta: f64) {
    let p_psi = masks.apply(&state.amplitudes);
    let cos = (theta / 2.0).cos();
    let minus_i_sin = Complex64::new(0.0, -(theta / 2.0).sin());
    for (amp, p) in state.amplitudes.iter_mut().zip(p_psi) {
        *amp = *amp * cos + minus_i_sin * p;
    }
}

/// Apply the Pauli string `masks` to the subspace where `control` is |1⟩.
///
/// `masks` must not touch the control qubit.
pub fn apply_controlled_pauli(state: &mut StateVector, control: usize, masks: &PauliMasks) {
    assert!(control < state.num_qubits, "control qubit out of range");
    let control_mask = 1 << control;
    assert_eq!(
        (masks.x_mask | masks.z_mask) & control_mask,
        0,
        "controlled Pauli acts on its own control qubit"
    );

    let mut out = state.amplitudes.clone();
    for (i, amp) in state.amplitudes.iter().enumerate() {
        if i & control_mask != 0 {
            out[i ^ masks.x_mask] = masks.phase(i) * amp;
        }
    }
    state.amplitudes = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum_info::{Pauli, PauliMasks};

    fn nearly_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn test_x_gate_flips_qubit() {
        let mut state = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut state, &pauli_x(), 0);
        assert!(nearly_eq(state.probability(0), 0.0));
        assert!(nearly_eq(state.probability(1), 1.0));
    }

    #[test]
    fn test_hadamard_twice_is_identity() {
        let mut state = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        assert!(nearly_eq(state.probability(1), 0.5));
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        assert!(nearly_eq(state.probability(0), 1.0));
    }

    #[test]
    fn test_sx_squared_is_x() {
        let mut state = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut state, &sx_gate(), 0);
        apply_single_qubit_gate(&mut state, &sx_gate(), 0);
        assert!(nearly_eq(state.probability(1), 1.0));
    }

    #[test]
    fn test_s_then_sdg_restores_phase() {
        let mut state = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        let before = state.clone();
        apply_single_qubit_gate(&mut state, &s_gate(), 0);
        apply_single_qubit_gate(&mut state, &sdg_gate(), 0);
        assert!(nearly_eq(state.inner(&before).re, 1.0));
    }

    #[test]
    fn test_bell_state_creation() {
        let mut state = StateVector::new(2).unwrap();
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        apply_cnot(&mut state, 0, 1);
        assert!(nearly_eq(state.probability(0), 0.5));
        assert!(nearly_eq(state.probability(3), 0.5));
    }

    #[test]
    fn test_swap_gate() {
        let mut state = StateVector::new(2).unwrap();
        apply_single_qubit_gate(&mut state, &pauli_x(), 0);
        apply_swap(&mut state, 0, 1);
        assert!(nearly_eq(state.probability(2), 1.0));
    }

    #[test]
    fn test_toffoli_gate() {
        let mut state = StateVector::new(3).unwrap();
        apply_single_qubit_gate(&mut state, &pauli_x(), 1);
        apply_single_qubit_gate(&mut state, &pauli_x(), 2);
        apply_toffoli(&mut state, 1, 2, 0);
        assert!(nearly_eq(state.probability(7), 1.0));
    }

    #[test]
    fn test_pauli_rotation_matches_rx_matrix() {
        let theta = 0.731;
        let mut via_matrix = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut via_matrix, &rx(theta), 0);

        let mut via_generator = StateVector::new(1).unwrap();
        let masks = PauliMasks::from_sparse(&[(0, Pauli::X)]);
        apply_pauli_rotation(&mut via_generator, &masks, theta);

        for (a, b) in via_matrix.amplitudes.iter().zip(&via_generator.amplitudes) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_rzz_pi_on_plus_plus() {
        // Rzz(π)|++⟩ = −i Z⊗Z|++⟩ = −i|−−⟩
        let mut state = StateVector::new(2).unwrap();
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        apply_single_qubit_gate(&mut state, &hadamard(), 1);
        let masks = PauliMasks::from_sparse(&[(0, Pauli::Z), (1, Pauli::Z)]);
        apply_pauli_rotation(&mut state, &masks, PI);
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        apply_single_qubit_gate(&mut state, &hadamard(), 1);
        assert!(nearly_eq(state.probability(3), 1.0));
    }

    #[test]
    fn test_controlled_pauli_only_acts_when_control_set() {
        let masks = PauliMasks::from_sparse(&[(0, Pauli::X)]);

        let mut off = StateVector::new(2).unwrap();
        apply_controlled_pauli(&mut off, 1, &masks);
        assert!(nearly_eq(off.probability(0), 1.0));

        let mut on = StateVector::new(2).unwrap();
        apply_single_qubit_gate(&mut on, &pauli_x(), 1);
        apply_controlled_pauli(&mut on, 1, &masks);
        assert!(nearly_eq(on.probability(3), 1.0));
    }
}
