/// Parameterized circuit intermediate representation.
///
/// A `Circuit` is a flat, ordered sequence of `Instruction`s over a fixed
/// register, plus an ordered parameter table. Parameter values are supplied
/// at execution time in table order.
///
/// Design principles:
///   - One enum variant per instruction, no string dispatch at runtime
///   - Angles are affine expressions over parameter-table indices
///   - Qubit indices and parameter indices are validated on insertion
use super::parameter::{Angle, ParamExpr, Parameter};
use crate::core::state::MAX_QUBITS;
use crate::quantum_info::Pauli;
use crate::{Error, Result};
use std::fmt;

// ── Instruction ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // ── Fixed single-qubit gates ────────────────────────────────────────
    H(usize),
    X(usize),
    Y(usize),
    Z(usize),
    S(usize),
    Sdg(usize),
    T(usize),
    Sx(usize),

    // ── Parameterized rotations ─────────────────────────────────────────
    Rx    { qubit: usize, angle: Angle },
    Ry    { qubit: usize, angle: Angle },
    Rz    { qubit: usize, angle: Angle },
    Phase { qubit: usize, angle: Angle },
    Rxx   { qubit_a: usize, qubit_b: usize, angle: Angle },
    Ryy   { qubit_a: usize, qubit_b: usize, angle: Angle },
    Rzz   { qubit_a: usize, qubit_b: usize, angle: Angle },
    /// exp(−iθ/2 · Z_control ⊗ X_target)
    Rzx   { control: usize, target: usize, angle: Angle },

    // ── Fixed multi-qubit gates ─────────────────────────────────────────
    Cnot    { control: usize, target: usize },
    Cz      { control: usize, target: usize },
    Swap    { qubit_a: usize, qubit_b: usize },
    Toffoli { control0: usize, control1: usize, target: usize },
    /// Apply the Pauli string `paulis` when `control` is |1⟩.
    ControlledPauli { control: usize, paulis: Vec<(usize, Pauli)> },

    Barrier,
}

impl Instruction {
    /// Mnemonic name used in AQL source and diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::H(_)                   => "H",
            Self::X(_)                   => "X",
            Self::Y(_)                   => "Y",
            Self::Z(_)                   => "Z",
            Self::S(_)                   => "S",
            Self::Sdg(_)                 => "SDG",
            Self::T(_)                   => "T",
            Self::Sx(_)                  => "SX",
            Self::Rx { .. }              => "RX",
            Self::Ry { .. }              => "RY",
            Self::Rz { .. }              => "RZ",
            Self::Phase { .. }           => "PHASE",
            Self::Rxx { .. }             => "RXX",
            Self::Ryy { .. }             => "RYY",
            Self::Rzz { .. }             => "RZZ",
            Self::Rzx { .. }             => "RZX",
            Self::Cnot { .. }            => "CNOT",
            Self::Cz { .. }              => "CZ",
            Self::Swap { .. }            => "SWAP",
            Self::Toffoli { .. }         => "CCX",
            Self::ControlledPauli { .. } => "CPAULI",
            Self::Barrier                => "BARRIER",
        }
    }

    /// Qubit indices touched by this instruction.
    pub fn qubits(&self) -> Vec<usize> {
        match self {
            Self::H(q) | Self::X(q) | Self::Y(q) | Self::Z(q)
            | Self::S(q) | Self::Sdg(q) | Self::T(q) | Self::Sx(q)   => vec![*q],
            Self::Rx { qubit, .. } | Self::Ry { qubit, .. }
            | Self::Rz { qubit, .. } | Self::Phase { qubit, .. }    => vec![*qubit],
            Self::Rxx { qubit_a, qubit_b, .. }
            | Self::Ryy { qubit_a, qubit_b, .. }
            | Self::Rzz { qubit_a, qubit_b, .. }
            | Self::Swap { qubit_a, qubit_b }                         => vec![*qubit_a, *qubit_b],
            Self::Rzx { control, target, .. }
            | Self::Cnot { control, target }
            | Self::Cz { control, target }                            => vec![*control, *target],
            Self::Toffoli { control0, control1, target }              => vec![*control0, *control1, *target],
            Self::ControlledPauli { control, paulis } => {
                std::iter::once(*control).chain(paulis.iter().map(|(q, _)| *q)).collect()
            }
            Self::Barrier => vec![],
        }
    }

    pub fn angle(&self) -> Option<&Angle> {
        match self {
            Self::Rx { angle, .. } | Self::Ry { angle, .. } | Self::Rz { angle, .. }
            | Self::Phase { angle, .. } | Self::Rxx { angle, .. } | Self::Ryy { angle, .. }
            | Self::Rzz { angle, .. } | Self::Rzx { angle, .. } => Some(angle),
            _ => None,
        }
    }

    fn angle_mut(&mut self) -> Option<&mut Angle> {
        match self {
            Self::Rx { angle, .. } | Self::Ry { angle, .. } | Self::Rz { angle, .. }
            | Self::Phase { angle, .. } | Self::Rxx { angle, .. } | Self::Ryy { angle, .. }
            | Self::Rzz { angle, .. } | Self::Rzx { angle, .. } => Some(angle),
            _ => None,
        }
    }

    pub fn is_parameterized(&self) -> bool {
        self.angle().is_some_and(Angle::is_parameterized)
    }

    /// Pauli generator P such that the gate equals exp(−iθ/2 · P) up to a
    /// global phase. `None` for non-rotation instructions.
    pub fn generator(&self) -> Option<Vec<(usize, Pauli)>> {
        match self {
            Self::Rx { qubit, .. }              => Some(vec![(*qubit, Pauli::X)]),
            Self::Ry { qubit, .. }              => Some(vec![(*qubit, Pauli::Y)]),
            Self::Rz { qubit, .. }
            | Self::Phase { qubit, .. }         => Some(vec![(*qubit, Pauli::Z)]),
            Self::Rxx { qubit_a, qubit_b, .. }  => Some(vec![(*qubit_a, Pauli::X), (*qubit_b, Pauli::X)]),
            Self::Ryy { qubit_a, qubit_b, .. }  => Some(vec![(*qubit_a, Pauli::Y), (*qubit_b, Pauli::Y)]),
            Self::Rzz { qubit_a, qubit_b, .. }  => Some(vec![(*qubit_a, Pauli::Z), (*qubit_b, Pauli::Z)]),
            Self::Rzx { control, target, .. }   => Some(vec![(*control, Pauli::Z), (*target, Pauli::X)]),
            _ => None,
        }
    }

    /// Render with parameter names, in AQL syntax.
    pub fn render(&self, names: &[&str]) -> String {
        match self {
            Self::Rx { qubit, angle } | Self::Ry { qubit, angle }
            | Self::Rz { qubit, angle } | Self::Phase { qubit, angle } => {
                format!("{} {qubit} {}", self.mnemonic(), angle.render(names))
            }
            Self::Rxx { qubit_a, qubit_b, angle }
            | Self::Ryy { qubit_a, qubit_b, angle }
            | Self::Rzz { qubit_a, qubit_b, angle } => {
                format!("{} {qubit_a} {qubit_b} {}", self.mnemonic(), angle.render(names))
            }
            Self::Rzx { control, target, angle } => {
                format!("RZX {control} {target} {}", angle.render(names))
            }
            Self::ControlledPauli { control, paulis } => {
                let targets: Vec<String> =
                    paulis.iter().map(|(q, p)| format!("{}{q}", p.as_char())).collect();
                format!("CPAULI {control} {}", targets.join(" "))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H(q) | Self::X(q) | Self::Y(q) | Self::Z(q)
            | Self::S(q) | Self::Sdg(q) | Self::T(q) | Self::Sx(q) => write!(f, "{} {q}", self.mnemonic()),
            Self::Cnot { control, target }                 => write!(f, "CNOT {control} {target}"),
            Self::Cz { control, target }                   => write!(f, "CZ {control} {target}"),
            Self::Swap { qubit_a, qubit_b }                => write!(f, "SWAP {qubit_a} {qubit_b}"),
            Self::Toffoli { control0, control1, target }   => write!(f, "CCX {control0} {control1} {target}"),
            Self::Barrier                                  => write!(f, "BARRIER"),
            // angles fall back to positional names p0, p1, …
            other => {
                let count = other.angle().map_or(0, |a| a.terms().iter().map(|(i, _)| i + 1).max().unwrap_or(0));
                let names: Vec<String> = (0..count).map(|i| format!("p{i}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "{}", other.render(&refs))
            }
        }
    }
}

/// One appearance of a parameter inside a gate angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterOccurrence {
    /// Index into `Circuit::instructions`.
    pub instruction: usize,
    /// Index into `Circuit::parameters`.
    pub parameter: usize,
    /// ∂angle/∂parameter for that gate.
    pub coefficient: f64,
}

// ── Circuit ───────────────────────────────────────────────────────────────

/// A parameterized quantum circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    num_qubits: usize,
    parameters: Vec<Parameter>,
    instructions: Vec<Instruction>,
}

impl Circuit {
    pub fn new(num_qubits: usize) -> Result<Self> {
        if num_qubits == 0 {
            return Err(Error::validation("circuit must have at least 1 qubit"));
        }
        if num_qubits > MAX_QUBITS {
            return Err(Error::validation(format!(
                "{num_qubits} qubits exceeds the maximum of {MAX_QUBITS}"
            )));
        }
        Ok(Self { num_qubits, parameters: Vec::new(), instructions: Vec::new() })
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Parameter table, in declaration / first-use order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(Parameter::name).collect()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn gate_count(&self) -> usize {
        self.instructions.iter().filter(|i| !matches!(i, Instruction::Barrier)).count()
    }

    pub fn parameter_index(&self, param: &Parameter) -> Option<usize> {
        self.parameters.iter().position(|p| p == param)
    }

    /// Declare a parameter explicitly. Duplicate names are rejected.
    pub fn add_parameter(&mut self, param: Parameter) -> Result<usize> {
        if self.parameter_index(&param).is_some() {
            return Err(Error::validation(format!("parameter '{param}' declared twice")));
        }
        self.parameters.push(param);
        Ok(self.parameters.len() - 1)
    }

    /// Resolve a named expression against the parameter table, registering
    /// unseen parameters in first-use order.
    pub(crate) fn resolve(&mut self, expr: ParamExpr) -> Angle {
        let mut terms = Vec::with_capacity(expr.terms().len());
        for (param, coeff) in expr.terms() {
            let index = match self.parameter_index(param) {
                Some(i) => i,
                None => {
                    self.parameters.push(param.clone());
                    self.parameters.len() - 1
                }
            };
            terms.push((index, *coeff));
        }
        Angle::from_terms(terms, expr.offset())
    }

    fn validate(&self, instr: &Instruction) -> Result<()> {
        let qubits = instr.qubits();
        for (n, q) in qubits.iter().enumerate() {
            if *q >= self.num_qubits {
                return Err(Error::validation(format!(
                    "{}: qubit {q} out of range (register has {} qubits)",
                    instr.mnemonic(),
                    self.num_qubits
                )));
            }
            if qubits[..n].contains(q) {
                return Err(Error::validation(format!(
                    "{}: qubit {q} used more than once",
                    instr.mnemonic()
                )));
            }
        }
        if let Some(angle) = instr.angle() {
            if let Some((i, _)) = angle.terms().iter().find(|(i, _)| *i >= self.parameters.len()) {
                return Err(Error::validation(format!("unknown parameter index {i}")));
            }
        }
        Ok(())
    }

    /// Append a validated instruction.
    pub fn push(&mut self, instr: Instruction) -> Result<&mut Self> {
        self.validate(&instr)?;
        self.instructions.push(instr);
        Ok(self)
    }

    /// Insert a validated instruction before position `index`.
    pub fn insert(&mut self, index: usize, instr: Instruction) -> Result<()> {
        if index > self.instructions.len() {
            return Err(Error::validation(format!("insert position {index} out of range")));
        }
        self.validate(&instr)?;
        self.instructions.insert(index, instr);
        Ok(())
    }

    /// Resolve `expr` and push the rotation built from it. Parameters first
    /// seen here are dropped again if the instruction is rejected.
    fn push_rotation(
        &mut self,
        expr: ParamExpr,
        build: impl FnOnce(Angle) -> Instruction,
    ) -> Result<&mut Self> {
        let declared = self.parameters.len();
        let instr = build(self.resolve(expr));
        if let Err(e) = self.validate(&instr) {
            self.parameters.truncate(declared);
            return Err(e);
        }
        self.instructions.push(instr);
        Ok(self)
    }

    // ── Builder API ───────────────────────────────────────────────────────

    pub fn h(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::H(q)) }
    pub fn x(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::X(q)) }
    pub fn y(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::Y(q)) }
    pub fn z(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::Z(q)) }
    pub fn s(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::S(q)) }
    pub fn sdg(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::Sdg(q)) }
    pub fn t(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::T(q)) }
    pub fn sx(&mut self, q: usize) -> Result<&mut Self> { self.push(Instruction::Sx(q)) }

    pub fn rx(&mut self, qubit: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Rx { qubit, angle })
    }

    pub fn ry(&mut self, qubit: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Ry { qubit, angle })
    }

    pub fn rz(&mut self, qubit: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Rz { qubit, angle })
    }

    pub fn phase(&mut self, qubit: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Phase { qubit, angle })
    }

    pub fn rxx(&mut self, qubit_a: usize, qubit_b: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Rxx { qubit_a, qubit_b, angle })
    }

    pub fn ryy(&mut self, qubit_a: usize, qubit_b: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Ryy { qubit_a, qubit_b, angle })
    }

    pub fn rzz(&mut self, qubit_a: usize, qubit_b: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Rzz { qubit_a, qubit_b, angle })
    }

    pub fn rzx(&mut self, control: usize, target: usize, angle: impl Into<ParamExpr>) -> Result<&mut Self> {
        self.push_rotation(angle.into(), |angle| Instruction::Rzx { control, target, angle })
    }

    pub fn cnot(&mut self, control: usize, target: usize) -> Result<&mut Self> {
        self.push(Instruction::Cnot { control, target })
    }

    pub fn cz(&mut self, control: usize, target: usize) -> Result<&mut Self> {
        self.push(Instruction::Cz { control, target })
    }

    pub fn swap(&mut self, qubit_a: usize, qubit_b: usize) -> Result<&mut Self> {
        self.push(Instruction::Swap { qubit_a, qubit_b })
    }

    pub fn toffoli(&mut self, control0: usize, control1: usize, target: usize) -> Result<&mut Self> {
        self.push(Instruction::Toffoli { control0, control1, target })
    }

    pub fn barrier(&mut self) -> Result<&mut Self> {
        self.push(Instruction::Barrier)
    }

    // ── Gradient support ──────────────────────────────────────────────────

    /// Every (gate, parameter) pair with a non-zero coefficient, in program order.
    pub fn parameter_occurrences(&self) -> Vec<ParameterOccurrence> {
        self.instructions
            .iter()
            .enumerate()
            .filter_map(|(i, instr)| instr.angle().map(|a| (i, a)))
            .flat_map(|(instruction, angle)| {
                angle.terms().iter().map(move |&(parameter, coefficient)| ParameterOccurrence {
                    instruction,
                    parameter,
                    coefficient,
                })
            })
            .collect()
    }

    /// Copy with `delta` added to the angle of instruction `index`.
    pub fn with_angle_shift(&self, index: usize, delta: f64) -> Result<Circuit> {
        let mut shifted = self.clone();
        let angle = shifted
            .instructions
            .get_mut(index)
            .and_then(Instruction::angle_mut)
            .ok_or_else(|| Error::validation(format!("instruction {index} has no angle to shift")))?;
        *angle = angle.shifted(delta);
        Ok(shifted)
    }

    /// Copy with one extra qubit appended as the new highest index.
    pub fn with_ancilla(&self) -> Result<Circuit> {
        let mut wider = Circuit::new(self.num_qubits + 1)?;
        wider.parameters = self.parameters.clone();
        wider.instructions = self.instructions.clone();
        Ok(wider)
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.parameter_names();
        if !names.is_empty() {
            writeln!(f, "PARAM {}", names.join(" "))?;
        }
        writeln!(f, "QREG {}", self.num_qubits)?;
        for instr in &self.instructions {
            writeln!(f, "{}", instr.render(&names))?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_registers_parameters_in_first_use_order() {
        let b = Parameter::new("b");
        let a = Parameter::new("a");
        let mut qc = Circuit::new(2).unwrap();
        qc.rx(0, &b).unwrap().ry(1, &a).unwrap().rz(0, &b).unwrap();
        assert_eq!(qc.parameter_names(), vec!["b", "a"]);
        assert_eq!(qc.gate_count(), 3);
    }

    #[test]
    fn test_duplicate_parameter_declaration() {
        let mut qc = Circuit::new(1).unwrap();
        qc.add_parameter(Parameter::new("t")).unwrap();
        assert!(qc.add_parameter(Parameter::new("t")).is_err());
    }

    #[test]
    fn test_out_of_range_and_repeated_qubits_rejected() {
        let mut qc = Circuit::new(2).unwrap();
        assert!(matches!(qc.h(2), Err(Error::Validation(_))));
        assert!(matches!(qc.cnot(1, 1), Err(Error::Validation(_))));
        assert!(qc.instructions().is_empty());
        assert!(qc.rx(5, Parameter::new("lost")).is_err());
        assert_eq!(qc.num_parameters(), 0);
    }

    #[test]
    fn test_parameter_occurrences_carry_coefficients() {
        let t = Parameter::new("t");
        let mut qc = Circuit::new(1).unwrap();
        qc.rx(0, t.clone() * 2.0).unwrap().h(0).unwrap().rz(0, &t).unwrap().rz(0, 0.3).unwrap();
        let occ = qc.parameter_occurrences();
        assert_eq!(occ.len(), 2);
        assert_eq!(occ[0], ParameterOccurrence { instruction: 0, parameter: 0, coefficient: 2.0 });
        assert_eq!(occ[1], ParameterOccurrence { instruction: 2, parameter: 0, coefficient: 1.0 });
    }

    #[test]
    fn test_with_angle_shift() {
        let t = Parameter::new("t");
        let mut qc = Circuit::new(1).unwrap();
        qc.rx(0, &t).unwrap().h(0).unwrap();
        let shifted = qc.with_angle_shift(0, 0.5).unwrap();
        assert!((shifted.instructions()[0].angle().unwrap().evaluate(&[1.0]) - 1.5).abs() < 1e-15);
        assert!(qc.with_angle_shift(1, 0.5).is_err());
    }

    #[test]
    fn test_with_ancilla_keeps_program() {
        let mut qc = Circuit::new(2).unwrap();
        qc.h(0).unwrap().cnot(0, 1).unwrap();
        let wide = qc.with_ancilla().unwrap();
        assert_eq!(wide.num_qubits(), 3);
        assert_eq!(wide.instructions(), qc.instructions());
    }

    #[test]
    fn test_generator_of_rotations() {
        let rzx = Instruction::Rzx { control: 0, target: 1, angle: Angle::fixed(0.1) };
        assert_eq!(rzx.generator(), Some(vec![(0, Pauli::Z), (1, Pauli::X)]));
        assert_eq!(Instruction::H(0).generator(), None);
    }

    #[test]
    fn test_display_uses_parameter_names() {
        let t = Parameter::new("theta");
        let mut qc = Circuit::new(2).unwrap();
        qc.rx(0, &t).unwrap().cnot(0, 1).unwrap();
        let text = qc.to_string();
        assert!(text.contains("PARAM theta"));
        assert!(text.contains("RX 0 theta"));
        assert!(text.contains("CNOT 0 1"));
    }

    #[test]
    fn test_display_reparses_to_same_angles() {
        let source = "PARAM a\nQREG 2\nRZ 0 PI/3\nRX 1 a+PI/7\nRZZ 0 1 2*a-PI_4";
        let qc = crate::circuit::parse_source(source).unwrap();
        let again = crate::circuit::parse_source(&qc.to_string()).unwrap();
        assert_eq!(again.instructions().len(), qc.instructions().len());
        for (x, y) in qc.instructions().iter().zip(again.instructions()) {
            let (x, y) = (x.angle().unwrap(), y.angle().unwrap());
            assert_eq!(x.offset(), y.offset());
            assert_eq!(x.coefficient(0), y.coefficient(0));
        }
    }
}
