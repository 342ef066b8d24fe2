//! # astragrad
//!
//! Statevector Estimator/Sampler primitives and gradients of their outputs
//! with respect to circuit parameters.
//!
//! ## Quick Start
//!
//! ```rust
//! use astragrad::circuit::parse_source;
//! use astragrad::gradients::{BaseEstimatorGradient, ParamShiftEstimatorGradient};
//! use astragrad::primitives::Estimator;
//! use astragrad::quantum_info::SparsePauliOp;
//!
//! // ⟨Z⟩ = cos θ after RX(θ) on |0⟩
//! let circuit = parse_source("PARAM theta\nQREG 1\nRX 0 theta").unwrap();
//! let observable = SparsePauliOp::from_label("Z").unwrap();
//!
//! let gradient = ParamShiftEstimatorGradient::new(Estimator::new());
//! let job = gradient
//!     .run(vec![circuit], vec![observable], vec![vec![0.5]], None)
//!     .unwrap();
//! let result = job.result().unwrap();
//!
//! assert!((result.gradients[0][0] + 0.5_f64.sin()).abs() < 1e-9);
//! ```
//!
//! ## Layout
//!
//! - [`core`]: statevector, gate kernels and the circuit simulator
//! - [`circuit`]: parameterized circuits and the AQL text front-end
//! - [`quantum_info`]: Pauli strings and `SparsePauliOp` observables
//! - [`primitives`]: `Estimator`, `Sampler` and asynchronous `Job`s
//! - [`gradients`]: finite difference, parameter shift, LCU and SPSA gradients
//! - [`optimizers`]: UMDA and gradient descent
//! - [`config`]: TOML gradient job files

pub mod circuit;
pub mod config;
pub mod core;
pub mod error;
pub mod gradients;
pub mod logging;
pub mod optimizers;
pub mod primitives;
pub mod quantum_info;

pub use error::{Error, Result};
