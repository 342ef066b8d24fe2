/// Circuit parameters and linear parameter expressions.
///
/// Gate angles are restricted to affine combinations `Σ cᵢ·θᵢ + offset`.
/// That is enough for the usual ansatz patterns (`2*theta`, `theta + PI_2`,
/// `a - b`) and keeps ∂angle/∂θᵢ a constant, which the gradient methods
/// fold into their chain rule.
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A named free parameter. Identity is by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parameter {
    name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A user-facing affine expression over named parameters.
///
/// Circuits resolve these into index-based [`Angle`]s on insertion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamExpr {
    terms: Vec<(Parameter, f64)>,
    offset: f64,
}

impl ParamExpr {
    pub fn constant(value: f64) -> Self {
        Self { terms: Vec::new(), offset: value }
    }

    pub fn terms(&self) -> &[(Parameter, f64)] {
        &self.terms
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    fn add_term(&mut self, param: Parameter, coeff: f64) {
        match self.terms.iter_mut().find(|(p, _)| *p == param) {
            Some((_, c)) => *c += coeff,
            None => self.terms.push((param, coeff)),
        }
        self.terms.retain(|(_, c)| *c != 0.0);
    }
}

impl From<f64> for ParamExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<Parameter> for ParamExpr {
    fn from(param: Parameter) -> Self {
        Self { terms: vec![(param, 1.0)], offset: 0.0 }
    }
}

impl From<&Parameter> for ParamExpr {
    fn from(param: &Parameter) -> Self {
        param.clone().into()
    }
}

impl Add for ParamExpr {
    type Output = ParamExpr;
    fn add(mut self, rhs: ParamExpr) -> ParamExpr {
        for (p, c) in rhs.terms {
            self.add_term(p, c);
        }
        self.offset += rhs.offset;
        self
    }
}

impl Add<f64> for ParamExpr {
    type Output = ParamExpr;
    fn add(mut self, rhs: f64) -> ParamExpr {
        self.offset += rhs;
        self
    }
}

impl Sub for ParamExpr {
    type Output = ParamExpr;
    fn sub(self, rhs: ParamExpr) -> ParamExpr {
        self + (-rhs)
    }
}

impl Mul<f64> for ParamExpr {
    type Output = ParamExpr;
    fn mul(mut self, rhs: f64) -> ParamExpr {
        for (_, c) in self.terms.iter_mut() {
            *c *= rhs;
        }
        self.terms.retain(|(_, c)| *c != 0.0);
        self.offset *= rhs;
        self
    }
}

impl Neg for ParamExpr {
    type Output = ParamExpr;
    fn neg(self) -> ParamExpr {
        self * -1.0
    }
}

impl Mul<f64> for Parameter {
    type Output = ParamExpr;
    fn mul(self, rhs: f64) -> ParamExpr {
        ParamExpr::from(self) * rhs
    }
}

impl Add<f64> for Parameter {
    type Output = ParamExpr;
    fn add(self, rhs: f64) -> ParamExpr {
        ParamExpr::from(self) + rhs
    }
}

/// A resolved gate angle: `Σ coeff · values[index] + offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Angle {
    terms: Vec<(usize, f64)>,
    offset: f64,
}

impl Angle {
    pub fn fixed(value: f64) -> Self {
        Self { terms: Vec::new(), offset: value }
    }

    /// `coeff · θ[index]`
    pub fn param(index: usize, coeff: f64) -> Self {
        Self::from_terms(vec![(index, coeff)], 0.0)
    }

    pub(crate) fn from_terms(terms: Vec<(usize, f64)>, offset: f64) -> Self {
        Self { terms, offset }
    }

    pub fn is_parameterized(&self) -> bool {
        !self.terms.is_empty()
    }

    /// `(parameter index, coefficient)` pairs.
    pub fn terms(&self) -> &[(usize, f64)] {
        &self.terms
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// ∂angle/∂θ[index]
    pub fn coefficient(&self, index: usize) -> f64 {
        self.terms
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, c)| c)
            .sum()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|(i, c)| c * values[*i]).sum::<f64>() + self.offset
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            terms: self.terms.iter().map(|(i, c)| (*i, c * factor)).collect(),
            offset: self.offset * factor,
        }
    }

    /// Same expression with `delta` added to the offset.
    pub fn shifted(&self, delta: f64) -> Self {
        Self { terms: self.terms.clone(), offset: self.offset + delta }
    }

    /// Render using the circuit's parameter names.
    pub fn render(&self, names: &[&str]) -> String {
        if self.terms.is_empty() {
            return format!("{}", self.offset);
        }
        let mut out = String::new();
        for (n, (i, c)) in self.terms.iter().enumerate() {
            let name = names.get(*i).copied().unwrap_or("?");
            let sign = if *c < 0.0 { "-" } else if n > 0 { "+" } else { "" };
            if (c.abs() - 1.0).abs() < 1e-15 {
                out.push_str(&format!("{sign}{name}"));
            } else {
                out.push_str(&format!("{sign}{}*{name}", c.abs()));
            }
        }
        if self.offset < 0.0 {
            out.push_str(&format!("-{}", -self.offset));
        } else if self.offset > 0.0 {
            out.push_str(&format!("+{}", self.offset));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_arithmetic() {
        let a = Parameter::new("a");
        let b = Parameter::new("b");
        let expr = a.clone() * 2.0 + ParamExpr::from(&b) - ParamExpr::from(&a) + 0.5;
        assert_eq!(expr.terms(), &[(a, 1.0), (b, 1.0)]);
        assert!((expr.offset() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_cancelling_terms_drop_out() {
        let a = Parameter::new("a");
        let expr = ParamExpr::from(&a) - ParamExpr::from(&a);
        assert!(expr.is_constant());
    }

    #[test]
    fn test_angle_evaluate_and_coefficient() {
        let angle = Angle::from_terms(vec![(0, 2.0), (1, -1.0)], 0.25);
        assert!((angle.evaluate(&[1.0, 3.0]) - (2.0 - 3.0 + 0.25)).abs() < 1e-15);
        assert_eq!(angle.coefficient(0), 2.0);
        assert_eq!(angle.coefficient(2), 0.0);
        assert!((angle.shifted(1.0).offset() - 1.25).abs() < 1e-15);
        assert_eq!(Angle::param(1, 3.0).scaled(2.0).coefficient(1), 6.0);
    }

    #[test]
    fn test_angle_render() {
        let angle = Angle::from_terms(vec![(0, 2.0), (1, -1.0)], 0.0);
        assert_eq!(angle.render(&["a", "b"]), "2*a-b");
        assert_eq!(Angle::fixed(0.5).render(&[]), "0.5");
        assert_eq!(Angle::from_terms(vec![(0, 1.0)], -0.25).render(&["a"]), "a-0.25");
    }
}
