/// Single-qubit Paulis and dense Pauli strings.
///
/// Labels follow the usual little-endian convention: the rightmost character
/// acts on qubit 0, so `"XZ"` is Z on qubit 0 and X on qubit 1.
///
/// A Pauli string acts on a basis state as
///
/// ```text
/// P|i⟩ = i^(#Y) · (−1)^popcount(i & z_mask) · |i ⊕ x_mask⟩
/// ```
///
/// where `x_mask` marks X/Y positions and `z_mask` marks Z/Y positions.
use crate::{Error, Result};
use num_complex::Complex64;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'I' => Some(Pauli::I),
            'X' => Some(Pauli::X),
            'Y' => Some(Pauli::Y),
            'Z' => Some(Pauli::Z),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Pauli::I => 'I',
            Pauli::X => 'X',
            Pauli::Y => 'Y',
            Pauli::Z => 'Z',
        }
    }
}

/// Bit-mask form of a Pauli string, ready to apply to amplitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PauliMasks {
    pub x_mask: usize,
    pub z_mask: usize,
    pub num_y: u32,
}

impl PauliMasks {
    /// Build masks from sparse `(qubit, pauli)` pairs.
    pub fn from_sparse(ops: &[(usize, Pauli)]) -> Self {
        let mut masks = Self::default();
        for &(q, p) in ops {
            match p {
                Pauli::I => {}
                Pauli::X => masks.x_mask |= 1 << q,
                Pauli::Z => masks.z_mask |= 1 << q,
                Pauli::Y => {
                    masks.x_mask |= 1 << q;
                    masks.z_mask |= 1 << q;
                    masks.num_y += 1;
                }
            }
        }
        masks
    }

    /// Phase picked up by basis state `index`: i^(#Y)·(−1)^popcount(index & z).
    #[inline(always)]
    pub fn phase(&self, index: usize) -> Complex64 {
        let global = match self.num_y % 4 {
            0 => Complex64::new(1.0, 0.0),
            1 => Complex64::new(0.0, 1.0),
            2 => Complex64::new(-1.0, 0.0),
            _ => Complex64::new(0.0, -1.0),
        };
        if (index & self.z_mask).count_ones() % 2 == 1 {
            -global
        } else {
            global
        }
    }

    /// Return P·amplitudes as a new vector.
    pub fn apply(&self, amplitudes: &[Complex64]) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); amplitudes.len()];
        for (i, amp) in amplitudes.iter().enumerate() {
            out[i ^ self.x_mask] = self.phase(i) * amp;
        }
        out
    }

    /// ⟨ψ|P|ψ⟩ without materializing P|ψ⟩.
    pub fn expectation(&self, amplitudes: &[Complex64]) -> Complex64 {
        amplitudes
            .iter()
            .enumerate()
            .map(|(i, amp)| amplitudes[i ^ self.x_mask].conj() * self.phase(i) * amp)
            .sum()
    }
}

/// Dense Pauli string over `len()` qubits; `paulis[q]` acts on qubit `q`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PauliString {
    paulis: Vec<Pauli>,
}

impl PauliString {
    pub fn new(paulis: Vec<Pauli>) -> Self {
        Self { paulis }
    }

    pub fn identity(num_qubits: usize) -> Self {
        Self { paulis: vec![Pauli::I; num_qubits] }
    }

    /// Parse a label such as `"IXZ"` (rightmost character = qubit 0).
    pub fn from_label(label: &str) -> Result<Self> {
        if label.is_empty() {
            return Err(Error::invalid_input("empty Pauli label"));
        }
        let paulis = label
            .chars()
            .rev()
            .map(|c| {
                Pauli::from_char(c)
                    .ok_or_else(|| Error::invalid_input(format!("invalid Pauli '{c}' in label '{label}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { paulis })
    }

    pub fn num_qubits(&self) -> usize {
        self.paulis.len()
    }

    pub fn get(&self, qubit: usize) -> Pauli {
        self.paulis[qubit]
    }

    /// Tensor `pauli` onto a new highest qubit.
    pub fn expand(&self, pauli: Pauli) -> Self {
        let mut paulis = self.paulis.clone();
        paulis.push(pauli);
        Self { paulis }
    }

    pub fn masks(&self) -> PauliMasks {
        let sparse: Vec<(usize, Pauli)> = self.paulis.iter().copied().enumerate().collect();
        PauliMasks::from_sparse(&sparse)
    }

    pub fn label(&self) -> String {
        self.paulis.iter().rev().map(Pauli::as_char).collect()
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
