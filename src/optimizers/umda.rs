/// Continuous Univariate Marginal Distribution Algorithm (UMDA).
///
/// An estimation-of-distribution algorithm: each variable is modelled by an
/// independent normal distribution. Every iteration evaluates the current
/// generation, keeps the best `⌊size_gen·alpha⌋` individuals, refits the
/// per-variable mean and standard deviation to them and samples fresh
/// individuals from the updated model. A share of the elite survives into the
/// next generation.
///
/// The model starts at μ = π, σ = 0.5 for every variable, which suits
/// rotation angles. The standard deviation never drops below
/// [`STD_BOUND`] so the search keeps exploring.
use super::{Jacobian, Objective, Optimizer, OptimizerResult};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Fraction of the truncated generation carried into the next one.
pub const ELITE_FACTOR: f64 = 0.4;
/// Lower bound on each variable's standard deviation.
pub const STD_BOUND: f64 = 0.3;

const INITIAL_STD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Umda {
    maxiter: usize,
    size_gen: usize,
    n_variables: usize,
    alpha: f64,
    truncation_length: usize,
    /// Stalled iterations before stopping; `None` never stops early.
    dead_iter: Option<usize>,
    disp: bool,
    seed: Option<u64>,

    mean: Vec<f64>,
    std: Vec<f64>,
    generation: Vec<Vec<f64>>,
    history: Vec<f64>,
    best_fun: f64,
    best_x: Vec<f64>,
}

impl Umda {
    pub fn new(maxiter: usize, size_gen: usize, n_variables: usize) -> Result<Self> {
        if maxiter == 0 {
            return Err(Error::invalid_input("UMDA maxiter must be at least 1"));
        }
        if size_gen == 0 || n_variables == 0 {
            return Err(Error::invalid_input("UMDA size_gen and n_variables must be at least 1"));
        }
        let mut umda = Self {
            maxiter,
            size_gen,
            n_variables,
            alpha: 0.5,
            truncation_length: 0,
            dead_iter: (maxiter % 5 == 0).then_some(maxiter / 5),
            disp: false,
            seed: None,
            mean: Vec::new(),
            std: Vec::new(),
            generation: Vec::new(),
            history: Vec::new(),
            best_fun: f64::INFINITY,
            best_x: Vec::new(),
        };
        umda.set_alpha(0.5)?;
        Ok(umda)
    }

    /// Selection ratio in (0, 1]; must keep at least one individual.
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self> {
        self.set_alpha(alpha)?;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Log progress at info level after each minimization.
    pub fn with_disp(mut self, disp: bool) -> Self {
        self.disp = disp;
        self
    }

    fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::invalid_input(format!("UMDA alpha must be in (0, 1], got {alpha}")));
        }
        let truncation_length = (self.size_gen as f64 * alpha) as usize;
        if truncation_length == 0 {
            return Err(Error::invalid_input(format!(
                "size_gen {} with alpha {alpha} selects no individuals",
                self.size_gen
            )));
        }
        self.alpha = alpha;
        self.truncation_length = truncation_length;
        Ok(())
    }

    pub fn maxiter(&self) -> usize {
        self.maxiter
    }

    pub fn size_gen(&self) -> usize {
        self.size_gen
    }

    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Best objective value of every completed iteration.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn best_fun(&self) -> f64 {
        self.best_fun
    }

    pub fn best_x(&self) -> &[f64] {
        &self.best_x
    }

    /// Individuals of the current generation, one row per individual.
    pub fn generation(&self) -> &[Vec<f64>] {
        &self.generation
    }

    /// Current per-variable model as (mean, std).
    pub fn model(&self) -> (&[f64], &[f64]) {
        (&self.mean, &self.std)
    }

    fn sample(&self, rng: &mut StdRng, count: usize) -> Result<Vec<Vec<f64>>> {
        let normals = self
            .mean
            .iter()
            .zip(&self.std)
            .map(|(&mu, &sigma)| {
                Normal::new(mu, sigma).map_err(|e| Error::invalid_input(format!("UMDA model: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((0..count)
            .map(|_| normals.iter().map(|n| n.sample(rng)).collect())
            .collect())
    }

    /// Refit mean and population standard deviation per variable.
    fn update_model(&mut self) {
        let count = self.generation.len() as f64;
        for v in 0..self.n_variables {
            let mean = self.generation.iter().map(|ind| ind[v]).sum::<f64>() / count;
            let var = self.generation.iter().map(|ind| (ind[v] - mean).powi(2)).sum::<f64>() / count;
            self.mean[v] = mean;
            self.std[v] = var.sqrt().max(STD_BOUND);
        }
    }

    /// Evaluate the generation and keep its best `truncation_length` individuals.
    fn evaluate_and_truncate(&mut self, fun: &mut Objective<'_>) -> Result<Vec<f64>> {
        let mut scored = std::mem::take(&mut self.generation)
            .into_iter()
            .map(|ind| fun(ind.as_slice()).map(|f| (f, ind)))
            .collect::<Result<Vec<_>>>()?;
        // stable, so ties keep generation order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(self.truncation_length);
        let (evaluations, generation): (Vec<f64>, Vec<Vec<f64>>) = scored.into_iter().unzip();
        self.generation = generation;
        Ok(evaluations)
    }
}

impl Optimizer for Umda {
    /// `x0`, `jac` and `bounds` are ignored: the search starts from the
    /// initial model and uses objective values only.
    ///
    /// Every call starts over. The model, generation, history and best point
    /// of a previous call are discarded rather than carried forward.
    fn minimize(
        &mut self,
        fun: &mut Objective<'_>,
        _x0: &[f64],
        _jac: Option<&mut Jacobian<'_>>,
        _bounds: Option<&[(f64, f64)]>,
    ) -> Result<OptimizerResult> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.mean = vec![PI; self.n_variables];
        self.std = vec![INITIAL_STD; self.n_variables];
        self.history.clear();
        self.best_fun = f64::INFINITY;
        self.best_x = vec![0.0; self.n_variables];
        self.generation = self.sample(&mut rng, self.size_gen)?;

        let mut not_better = 0;
        for iteration in 0..self.maxiter {
            let evaluations = self.evaluate_and_truncate(fun)?;
            self.update_model();

            let best_local = evaluations[0];
            self.history.push(best_local);
            if best_local < self.best_fun {
                self.best_fun = best_local;
                self.best_x = self.generation[0].clone();
                not_better = 0;
            } else {
                not_better += 1;
                if self.dead_iter == Some(not_better) {
                    debug!(iteration, "UMDA stalled");
                    break;
                }
            }

            let elites = (self.generation.len() as f64 * ELITE_FACTOR) as usize;
            self.generation.truncate(elites);
            let fresh = self.sample(&mut rng, self.size_gen)?;
            self.generation.extend(fresh);
            debug!(iteration, best_local, best = self.best_fun, "UMDA iteration");
        }

        let result = OptimizerResult {
            x: self.best_x.clone(),
            fun: self.best_fun,
            nfev: self.history.len() * self.size_gen,
            nit: self.history.len(),
        };
        if self.disp {
            info!(nfev = result.nfev, x = ?result.x, fun = result.fun, "UMDA finished");
        }
        Ok(result)
    }
}
