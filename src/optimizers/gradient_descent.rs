/// Plain gradient descent with a fixed learning rate.
///
///   x ← clip(x − η·∇f(x), bounds)
///
/// The gradient comes from the `jac` callback when one is given (typically a
/// gradient job) and from a central finite difference of `fun` otherwise.
use super::{Jacobian, Objective, Optimizer, OptimizerResult};
use crate::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDescent {
    learning_rate: f64,
    maxiter: usize,
    tol: f64,
    fd_epsilon: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self { learning_rate: 0.01, maxiter: 100, tol: 1e-7, fd_epsilon: 1e-6 }
    }
}

impl GradientDescent {
    pub fn new(learning_rate: f64, maxiter: usize, tol: f64) -> Result<Self> {
        if !(learning_rate > 0.0) {
            return Err(Error::invalid_input(format!(
                "learning rate must be positive, got {learning_rate}"
            )));
        }
        if maxiter == 0 {
            return Err(Error::invalid_input("gradient descent maxiter must be at least 1"));
        }
        if tol < 0.0 {
            return Err(Error::invalid_input(format!("tolerance must be non-negative, got {tol}")));
        }
        Ok(Self { learning_rate, maxiter, tol, ..Self::default() })
    }

    /// Step used by the finite difference fallback.
    pub fn with_fd_epsilon(mut self, epsilon: f64) -> Result<Self> {
        if !(epsilon > 0.0) {
            return Err(Error::invalid_input(format!("epsilon must be positive, got {epsilon}")));
        }
        self.fd_epsilon = epsilon;
        Ok(self)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn maxiter(&self) -> usize {
        self.maxiter
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    fn finite_difference(&self, fun: &mut Objective<'_>, x: &[f64], nfev: &mut usize) -> Result<Vec<f64>> {
        let mut point = x.to_vec();
        let mut grad = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            point[i] = x[i] + self.fd_epsilon;
            let plus = fun(&point)?;
            point[i] = x[i] - self.fd_epsilon;
            let minus = fun(&point)?;
            point[i] = x[i];
            *nfev += 2;
            grad.push((plus - minus) / (2.0 * self.fd_epsilon));
        }
        Ok(grad)
    }
}

fn clip(x: &mut [f64], bounds: Option<&[(f64, f64)]>) {
    if let Some(bounds) = bounds {
        for (v, &(lo, hi)) in x.iter_mut().zip(bounds) {
            *v = v.clamp(lo, hi);
        }
    }
}

impl Optimizer for GradientDescent {
    fn minimize(
        &mut self,
        fun: &mut Objective<'_>,
        x0: &[f64],
        mut jac: Option<&mut Jacobian<'_>>,
        bounds: Option<&[(f64, f64)]>,
    ) -> Result<OptimizerResult> {
        if let Some(bounds) = bounds {
            if bounds.len() != x0.len() {
                return Err(Error::invalid_input(format!(
                    "{} bounds for {} variables",
                    bounds.len(),
                    x0.len()
                )));
            }
            if let Some((lo, hi)) = bounds.iter().find(|(lo, hi)| lo > hi) {
                return Err(Error::invalid_input(format!("empty bound [{lo}, {hi}]")));
            }
        }

        let mut x = x0.to_vec();
        clip(&mut x, bounds);
        let mut fx = fun(&x)?;
        let mut nfev = 1;
        let mut nit = 0;

        while nit < self.maxiter {
            let grad = match jac.as_deref_mut() {
                Some(jac) => jac(&x)?,
                None => self.finite_difference(fun, &x, &mut nfev)?,
            };
            if grad.len() != x.len() {
                return Err(Error::invalid_input(format!(
                    "jacobian returned {} entries for {} variables",
                    grad.len(),
                    x.len()
                )));
            }
            for (v, g) in x.iter_mut().zip(&grad) {
                *v -= self.learning_rate * g;
            }
            clip(&mut x, bounds);
            let next = fun(&x)?;
            nfev += 1;
            nit += 1;

            let change = (fx - next).abs();
            fx = next;
            debug!(nit, fun = fx, change, "gradient descent step");
            if change < self.tol {
                break;
            }
        }

        Ok(OptimizerResult { x, fun: fx, nfev, nit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl() -> impl FnMut(&[f64]) -> Result<f64> {
        |x: &[f64]| Ok((x[0] - 1.0).powi(2) + 2.0 * (x[1] + 0.5).powi(2))
    }

    #[test]
    fn test_finite_difference_fallback_converges() {
        let mut gd = GradientDescent::new(0.1, 500, 1e-12).unwrap();
        let mut f = bowl();
        let result = gd.minimize(&mut f, &[0.0, 0.0], None, None).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-4);
        assert!((result.x[1] + 0.5).abs() < 1e-4);
        assert!(result.fun < 1e-8);
        // one initial evaluation, then 2·n for the gradient and 1 per step
        assert_eq!(result.nfev, 1 + result.nit * (2 * 2 + 1));
    }

    #[test]
    fn test_uses_jacobian_callback() {
        let mut gd = GradientDescent::new(0.1, 500, 1e-12).unwrap();
        let mut f = bowl();
        let mut calls = 0;
        let mut jac = |x: &[f64]| -> Result<Vec<f64>> {
            calls += 1;
            Ok(vec![2.0 * (x[0] - 1.0), 4.0 * (x[1] + 0.5)])
        };
        let result = gd.minimize(&mut f, &[3.0, 3.0], Some(&mut jac), None).unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-4);
        assert_eq!(result.nfev, 1 + result.nit);
        assert_eq!(calls, result.nit);
    }

    #[test]
    fn test_bounds_clip_iterates() {
        let mut gd = GradientDescent::new(0.1, 300, 1e-12).unwrap();
        let mut f = bowl();
        let bounds = [(-2.0, 0.5), (0.0, 1.0)];
        let result = gd.minimize(&mut f, &[0.0, 0.5], None, Some(&bounds[..])).unwrap();
        assert!((result.x[0] - 0.5).abs() < 1e-9);
        assert!(result.x[1].abs() < 1e-9);
    }

    #[test]
    fn test_maxiter_and_validation() {
        let mut gd = GradientDescent::new(0.01, 3, 0.0).unwrap();
        let mut f = bowl();
        assert_eq!(gd.minimize(&mut f, &[0.0, 0.0], None, None).unwrap().nit, 3);
        assert!(gd.minimize(&mut f, &[0.0, 0.0], None, Some(&[(0.0, 1.0)][..])).is_err());
        assert!(GradientDescent::new(0.0, 10, 1e-6).is_err());
        assert!(GradientDescent::new(0.1, 0, 1e-6).is_err());
        assert!(GradientDescent::default().with_fd_epsilon(-1.0).is_err());
    }
}
