use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by the circuit front-end, primitives and gradients.
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognized token in AQL source
    #[error("Lex error   line {line}: {msg}")]
    Lex { line: usize, msg: String },

    /// Syntactically invalid AQL statement
    #[error("Parse error line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// Semantically invalid circuit (e.g. out-of-range qubit)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Arguments handed to a primitive or gradient do not fit together
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The worker thread behind a job failed
    #[error("Job failed: {0}")]
    Job(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
