/// Primitives: batched expectation values and measurement distributions,
/// delivered through asynchronous jobs.
pub mod estimator;
pub mod job;
pub mod quasi;
pub mod sampler;

pub use estimator::{BaseEstimator, Estimator, EstimatorMetadata, EstimatorOptions, EstimatorResult};
pub use job::{Job, JobStatus};
pub use quasi::QuasiDistribution;
pub use sampler::{BaseSampler, Sampler, SamplerMetadata, SamplerOptions, SamplerResult};
