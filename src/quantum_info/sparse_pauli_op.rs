use super::pauli::{Pauli, PauliString};
use crate::core::StateVector;
use crate::{Error, Result};
use num_complex::Complex64;
use std::fmt;

/// An observable written as a weighted sum of Pauli strings, `O = Σ cₖ Pₖ`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePauliOp {
    num_qubits: usize,
    terms: Vec<(PauliString, Complex64)>,
}

impl SparsePauliOp {
    /// Build from `(label, coefficient)` pairs. All labels must share one width.
    pub fn from_list<S: AsRef<str>>(terms: &[(S, Complex64)]) -> Result<Self> {
        let first = terms
            .first()
            .ok_or_else(|| Error::invalid_input("observable needs at least one term"))?;
        let num_qubits = first.0.as_ref().len();

        let mut parsed = Vec::with_capacity(terms.len());
        for (label, coeff) in terms {
            let pauli = PauliString::from_label(label.as_ref())?;
            if pauli.num_qubits() != num_qubits {
                return Err(Error::invalid_input(format!(
                    "Pauli label '{}' has {} qubits, expected {num_qubits}",
                    label.as_ref(),
                    pauli.num_qubits()
                )));
            }
            parsed.push((pauli, *coeff));
        }
        Ok(Self { num_qubits, terms: parsed })
    }

    /// Build from real coefficients.
    pub fn from_real_list<S: AsRef<str>>(terms: &[(S, f64)]) -> Result<Self> {
        let complex: Vec<(&str, Complex64)> = terms
            .iter()
            .map(|(l, c)| (l.as_ref(), Complex64::new(*c, 0.0)))
            .collect();
        Self::from_list(&complex)
    }

    /// Single Pauli string with coefficient 1.
    pub fn from_label(label: &str) -> Result<Self> {
        Self::from_list(&[(label, Complex64::new(1.0, 0.0))])
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn terms(&self) -> &[(PauliString, Complex64)] {
        &self.terms
    }

    /// `pauli ⊗ self`: the new factor acts on a fresh highest qubit.
    pub fn expand(&self, pauli: Pauli) -> Self {
        Self {
            num_qubits: self.num_qubits + 1,
            terms: self.terms.iter().map(|(p, c)| (p.expand(pauli), *c)).collect(),
        }
    }

    /// Real part of ⟨ψ|O|ψ⟩.
    pub fn expectation(&self, state: &StateVector) -> f64 {
        self.terms
            .iter()
            .map(|(p, c)| (c * p.masks().expectation(&state.amplitudes)).re)
            .sum()
    }

    /// ⟨O²⟩ − ⟨O⟩², computed as ‖O|ψ⟩‖² − ⟨O⟩² (valid for Hermitian O).
    pub fn variance(&self, state: &StateVector) -> f64 {
        let mut o_psi = vec![Complex64::new(0.0, 0.0); state.dim()];
        for (p, c) in &self.terms {
            for (acc, v) in o_psi.iter_mut().zip(p.masks().apply(&state.amplitudes)) {
                *acc += c * v;
            }
        }
        let second_moment: f64 = o_psi.iter().map(|a| a.norm_sqr()).sum();
        let mean = self.expectation(state);
        (second_moment - mean * mean).max(0.0)
    }
}

impl fmt::Display for SparsePauliOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(p, c)| {
                if c.im.abs() < 1e-15 {
                    format!("{} * {}", c.re, p)
                } else {
                    format!("({}{:+}i) * {}", c.re, c.im, p)
                }
            })
            .collect();
        write!(f, "{}", parts.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gates::{apply_single_qubit_gate, hadamard};

    #[test]
    fn test_mismatched_widths_rejected() {
        let err = SparsePauliOp::from_real_list(&[("ZZ", 1.0), ("X", 1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_list_rejected() {
        let empty: [(&str, f64); 0] = [];
        assert!(SparsePauliOp::from_real_list(&empty).is_err());
    }

    #[test]
    fn test_weighted_expectation() {
        // |0⟩: ⟨Z⟩ = 1, ⟨X⟩ = 0
        let state = StateVector::new(1).unwrap();
        let op = SparsePauliOp::from_real_list(&[("Z", 2.0), ("X", 3.0)]).unwrap();
        assert!((op.expectation(&state) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_of_z_on_plus_state() {
        let mut state = StateVector::new(1).unwrap();
        apply_single_qubit_gate(&mut state, &hadamard(), 0);
        let z = SparsePauliOp::from_label("Z").unwrap();
        assert!(z.expectation(&state).abs() < 1e-12);
        assert!((z.variance(&state) - 1.0).abs() < 1e-12);
        let x = SparsePauliOp::from_label("X").unwrap();
        assert!(x.variance(&state).abs() < 1e-12);
    }

    #[test]
    fn test_expand_with_z() {
        let op = SparsePauliOp::from_label("X").unwrap().expand(Pauli::Z);
        assert_eq!(op.num_qubits(), 2);
        assert_eq!(op.terms()[0].0.label(), "ZX");
    }
}
