//! # gravity-core
//!
//! Shared types for gravity-model estimation: the crate-wide [`Error`] /
//! [`Result`], the columnar [`Dataset`] that holds bilateral records, and the
//! [`RegressionSummary`] returned by estimators.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Columnar in-memory dataset with typed column handles.
pub mod data;
/// Error types.
pub mod error;
/// Regression summary types.
pub mod types;

pub use data::{ColumnData, Dataset, NumericColumn, TextColumn};
pub use error::{Error, Result};
pub use types::{CoefficientEstimate, CovarianceType, INTERCEPT, RegressionSummary};
