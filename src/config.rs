//! Gradient job files.
//!
//! A job file is TOML:
//!
//! ```toml
//! circuit = """
//! PARAM a b
//! QREG 2
//! RY 0 a
//! RZZ 0 1 b
//! """
//! parameter_values = [[0.1, 0.2]]
//!
//! [[observable]]
//! label = "ZI"
//! coeff = 1.0
//!
//! [gradient]
//! method = "param_shift"
//!
//! [primitive]
//! kind = "estimator"
//! shots = 4000
//! seed = 7
//! ```
//!
//! `circuit_file` may replace `circuit`; relative paths resolve against the
//! job file's directory.

use crate::circuit::{self, Circuit, Parameter};
use crate::gradients::{
    BaseEstimatorGradient, BaseSamplerGradient, EstimatorGradientResult, FiniteDiffEstimatorGradient,
    FiniteDiffMethod, FiniteDiffSamplerGradient, LinCombEstimatorGradient, LinCombSamplerGradient,
    ParamShiftEstimatorGradient, ParamShiftSamplerGradient, SamplerGradientResult,
    SpsaEstimatorGradient, SpsaSamplerGradient,
};
use crate::primitives::{Estimator, EstimatorOptions, Sampler, SamplerOptions};
use crate::quantum_info::SparsePauliOp;
use crate::{Error, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMethod {
    FiniteDiff,
    #[default]
    ParamShift,
    LinComb,
    Spsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    #[default]
    Estimator,
    Sampler,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservableTerm {
    pub label: String,
    #[serde(default = "default_coeff")]
    pub coeff: f64,
    #[serde(default)]
    pub coeff_im: f64,
}

fn default_coeff() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    pub method: GradientMethod,
    /// Step size; required for `finite_diff` and `spsa`.
    pub epsilon: Option<f64>,
    pub fd_method: FiniteDiffMethod,
    /// SPSA perturbations per gradient.
    pub batch_size: Option<usize>,
    pub seed: Option<u64>,
    /// Differentiate only these parameters; all when absent.
    pub parameters: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PrimitiveConfig {
    pub kind: PrimitiveKind,
    pub shots: Option<u64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobConfig {
    /// Inline AQL source.
    pub circuit: Option<String>,
    pub circuit_file: Option<PathBuf>,
    /// One row of values per batch item.
    pub parameter_values: Vec<Vec<f64>>,
    #[serde(default, rename = "observable")]
    pub observables: Vec<ObservableTerm>,
    #[serde(default)]
    pub gradient: GradientConfig,
    #[serde(default)]
    pub primitive: PrimitiveConfig,

    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl JobConfig {
    /// Parse and validate a job from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: JobConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a job file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read job file {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!(path = %path.display(), "loaded job file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.circuit, &self.circuit_file) {
            (Some(_), Some(_)) => {
                return Err(Error::config("set either 'circuit' or 'circuit_file', not both"))
            }
            (None, None) => return Err(Error::config("missing 'circuit' or 'circuit_file'")),
            _ => {}
        }
        if self.parameter_values.is_empty() {
            return Err(Error::config("'parameter_values' needs at least one row"));
        }
        if let Some(row) = self.parameter_values.iter().find(|row| row.iter().any(|v| !v.is_finite())) {
            return Err(Error::config(format!("non-finite parameter value in {row:?}")));
        }

        match self.primitive.kind {
            PrimitiveKind::Estimator if self.observables.is_empty() => {
                return Err(Error::config("an estimator job needs at least one [[observable]]"));
            }
            PrimitiveKind::Sampler if !self.observables.is_empty() => {
                warn!("observables are ignored by sampler jobs");
            }
            _ => {}
        }
        if self.primitive.shots == Some(0) {
            return Err(Error::config("'shots' must be positive"));
        }

        let gradient = &self.gradient;
        match gradient.epsilon {
            Some(eps) if !(eps.is_finite() && eps > 0.0) => {
                return Err(Error::config(format!("'epsilon' must be positive, got {eps}")));
            }
            None if matches!(gradient.method, GradientMethod::FiniteDiff | GradientMethod::Spsa) => {
                return Err(Error::config("'epsilon' is required for finite_diff and spsa"));
            }
            _ => {}
        }
        if gradient.batch_size == Some(0) {
            return Err(Error::config("'batch_size' must be at least 1"));
        }
        Ok(())
    }

    /// The job's circuit, from inline source or `circuit_file`.
    pub fn load_circuit(&self) -> Result<Circuit> {
        match (&self.circuit, &self.circuit_file) {
            (Some(source), _) => circuit::parse_source(source),
            (None, Some(file)) => {
                let path = match &self.base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file.clone(),
                };
                circuit::parse_file(&path)
            }
            (None, None) => Err(Error::config("missing 'circuit' or 'circuit_file'")),
        }
    }

    /// Sum of the configured `[[observable]]` terms.
    pub fn observable(&self) -> Result<SparsePauliOp> {
        let terms: Vec<(&str, Complex64)> = self
            .observables
            .iter()
            .map(|t| (t.label.as_str(), Complex64::new(t.coeff, t.coeff_im)))
            .collect();
        SparsePauliOp::from_list(&terms)
    }

    fn selection(&self, rows: usize) -> Option<Vec<Vec<Parameter>>> {
        self.gradient.parameters.as_ref().map(|names| {
            let params: Vec<Parameter> = names.iter().map(Parameter::new).collect();
            vec![params; rows]
        })
    }

    /// Build the configured primitive and gradient, run it and wait for the result.
    pub fn run(&self) -> Result<GradientOutput> {
        let circuit = self.load_circuit()?;
        let rows = self.parameter_values.len();
        let circuits = vec![circuit; rows];
        let values = self.parameter_values.clone();
        let selection = self.selection(rows);
        let g = &self.gradient;
        info!(
            method = ?g.method,
            primitive = ?self.primitive.kind,
            items = rows,
            "running gradient job"
        );

        match self.primitive.kind {
            PrimitiveKind::Estimator => {
                let estimator = Estimator::with_options(EstimatorOptions {
                    shots: self.primitive.shots,
                    seed: self.primitive.seed,
                })?;
                let observables = vec![self.observable()?; rows];
                let result = match g.method {
                    GradientMethod::FiniteDiff => {
                        FiniteDiffEstimatorGradient::with_method(estimator, self.epsilon()?, g.fd_method)?
                            .run(circuits, observables, values, selection)?
                            .result()?
                    }
                    GradientMethod::ParamShift => ParamShiftEstimatorGradient::new(estimator)
                        .run(circuits, observables, values, selection)?
                        .result()?,
                    GradientMethod::LinComb => LinCombEstimatorGradient::new(estimator)
                        .run(circuits, observables, values, selection)?
                        .result()?,
                    GradientMethod::Spsa => SpsaEstimatorGradient::new(
                        estimator,
                        self.epsilon()?,
                        g.batch_size.unwrap_or(1),
                        g.seed,
                    )?
                    .run(circuits, observables, values, selection)?
                    .result()?,
                };
                Ok(GradientOutput::Estimator(result))
            }
            PrimitiveKind::Sampler => {
                let sampler = Sampler::with_options(SamplerOptions {
                    shots: self.primitive.shots,
                    seed: self.primitive.seed,
                })?;
                let result = match g.method {
                    GradientMethod::FiniteDiff => {
                        FiniteDiffSamplerGradient::with_method(sampler, self.epsilon()?, g.fd_method)?
                            .run(circuits, values, selection)?
                            .result()?
                    }
                    GradientMethod::ParamShift => ParamShiftSamplerGradient::new(sampler)
                        .run(circuits, values, selection)?
                        .result()?,
                    GradientMethod::LinComb => LinCombSamplerGradient::new(sampler)
                        .run(circuits, values, selection)?
                        .result()?,
                    GradientMethod::Spsa => SpsaSamplerGradient::new(
                        sampler,
                        self.epsilon()?,
                        g.batch_size.unwrap_or(1),
                        g.seed,
                    )?
                    .run(circuits, values, selection)?
                    .result()?,
                };
                Ok(GradientOutput::Sampler(result))
            }
        }
    }

    fn epsilon(&self) -> Result<f64> {
        self.gradient
            .epsilon
            .ok_or_else(|| Error::config("'epsilon' is required for finite_diff and spsa"))
    }
}

/// Result of a configured job, shaped by its primitive kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GradientOutput {
    Estimator(EstimatorGradientResult),
    Sampler(SamplerGradientResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL_JOB: &str = r#"
circuit = """
PARAM a b
QREG 2
RY 0 a
H 1
RZZ 0 1 b
H 1
"""
parameter_values = [[0.3, 1.1], [0.0, 0.5]]

[[observable]]
label = "IZ"
coeff = 1.0

[[observable]]
label = "ZI"
coeff = 2.0
"#;

    #[test]
    fn test_defaults_to_param_shift_estimator() {
        let config = JobConfig::from_toml(BELL_JOB).unwrap();
        assert_eq!(config.gradient.method, GradientMethod::ParamShift);
        assert_eq!(config.primitive.kind, PrimitiveKind::Estimator);
        assert_eq!(config.observables.len(), 2);

        let GradientOutput::Estimator(result) = config.run().unwrap() else {
            panic!("expected estimator output");
        };
        assert_eq!(result.gradients.len(), 2);
        for (row, grad) in config.parameter_values.iter().zip(&result.gradients) {
            assert!((grad[0] + row[0].sin()).abs() < 1e-9);
            assert!((grad[1] + 2.0 * row[1].sin()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_finite_diff_with_selection() {
        let text = format!(
            "{BELL_JOB}\n[gradient]\nmethod = \"finite_diff\"\nepsilon = 1e-6\nfd_method = \"forward\"\nparameters = [\"b\"]\n"
        );
        let config = JobConfig::from_toml(&text).unwrap();
        assert_eq!(config.gradient.fd_method, FiniteDiffMethod::Forward);
        let GradientOutput::Estimator(result) = config.run().unwrap() else {
            panic!("expected estimator output");
        };
        assert_eq!(result.gradients[0].len(), 1);
        assert_eq!(result.metadata[0].parameters, vec!["b".to_string()]);
        assert!((result.gradients[0][0] + 2.0 * 1.1_f64.sin()).abs() < 1e-4);
    }

    #[test]
    fn test_sampler_job() {
        let text = r#"
circuit = "PARAM t\nQREG 1\nRX 0 t"
parameter_values = [[0.7]]

[gradient]
method = "lin_comb"

[primitive]
kind = "sampler"
"#;
        let config = JobConfig::from_toml(text).unwrap();
        let GradientOutput::Sampler(result) = config.run().unwrap() else {
            panic!("expected sampler output");
        };
        let dist = &result.gradients[0][0];
        assert!((dist.get(1) - 0.7_f64.sin() / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_errors() {
        let no_circuit = "parameter_values = [[0.1]]\n[[observable]]\nlabel = \"Z\"\n";
        assert!(matches!(JobConfig::from_toml(no_circuit), Err(Error::Config(_))));

        let spsa_without_eps = format!("{BELL_JOB}\n[gradient]\nmethod = \"spsa\"\n");
        assert!(matches!(JobConfig::from_toml(&spsa_without_eps), Err(Error::Config(_))));

        let zero_shots = format!("{BELL_JOB}\n[primitive]\nshots = 0\n");
        assert!(matches!(JobConfig::from_toml(&zero_shots), Err(Error::Config(_))));

        let no_observable = "circuit = \"QREG 1\"\nparameter_values = [[]]\n";
        assert!(matches!(JobConfig::from_toml(no_observable), Err(Error::Config(_))));

        let unknown_method = format!("{BELL_JOB}\n[gradient]\nmethod = \"magic\"\n");
        assert!(matches!(JobConfig::from_toml(&unknown_method), Err(Error::Toml(_))));
    }

    #[test]
    fn test_observable_with_imaginary_part() {
        let text = format!(
            "{BELL_JOB}\n[[observable]]\nlabel = \"XX\"\ncoeff = 0.5\ncoeff_im = 0.25\n"
        );
        let config = JobConfig::from_toml(&text).unwrap();
        let op = config.observable().unwrap();
        assert_eq!(op.terms().len(), 3);
        assert_eq!(op.terms()[2].1, Complex64::new(0.5, 0.25));
    }

    #[test]
    fn test_circuit_file_resolves_relative_to_job() {
        let dir = std::env::temp_dir().join(format!("astragrad-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("rx.aql"), "PARAM t\nQREG 1\nRX 0 t\n").unwrap();
        fs::write(
            dir.join("job.toml"),
            "circuit_file = \"rx.aql\"\nparameter_values = [[0.4]]\n[[observable]]\nlabel = \"Z\"\n",
        )
        .unwrap();

        let config = JobConfig::from_file(dir.join("job.toml")).unwrap();
        let GradientOutput::Estimator(result) = config.run().unwrap() else {
            panic!("expected estimator output");
        };
        assert!((result.gradients[0][0] + 0.4_f64.sin()).abs() < 1e-9);
        fs::remove_dir_all(&dir).unwrap();
    }
}
