/// Classical optimizers for variational loops.
///
/// Objectives and Jacobians are fallible callbacks so a loop can drive an
/// estimator job for the value and a gradient job for the Jacobian and stop
/// on the first primitive error.
pub mod gradient_descent;
pub mod umda;

pub use gradient_descent::GradientDescent;
pub use umda::Umda;

use crate::Result;
use serde::Serialize;

/// Objective callback: parameter vector → scalar cost.
pub type Objective<'a> = dyn FnMut(&[f64]) -> Result<f64> + 'a;

/// Jacobian callback: parameter vector → ∂cost/∂xᵢ.
pub type Jacobian<'a> = dyn FnMut(&[f64]) -> Result<Vec<f64>> + 'a;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerResult {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    /// Number of objective evaluations.
    pub nfev: usize,
    /// Number of iterations performed.
    pub nit: usize,
}

pub trait Optimizer {
    /// Minimize `fun` starting from `x0`.
    ///
    /// `jac` and `bounds` are hints: an optimizer that does not use them
    /// ignores them.
    fn minimize(
        &mut self,
        fun: &mut Objective<'_>,
        x0: &[f64],
        jac: Option<&mut Jacobian<'_>>,
        bounds: Option<&[(f64, f64)]>,
    ) -> Result<OptimizerResult>;
}
