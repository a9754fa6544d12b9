//! Error types for gravity-model estimation

use thiserror::Error;

/// Gravity estimation error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid call arguments: reserved or colliding names, bad settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Problem with the input data, tied to the column that caused it.
    #[error("Data error in column `{column}`: {message}")]
    Data {
        /// Offending column (or derived variable) name.
        column: String,
        /// What went wrong.
        message: String,
    },

    /// Numerical failure (rank-deficient design, singular covariance)
    #[error("Computation error: {0}")]
    Computation(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::Data`] for `column`.
    pub fn data(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data { column: column.into(), message: message.into() }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
