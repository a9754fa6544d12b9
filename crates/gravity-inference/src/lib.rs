//! # gravity-inference
//!
//! Bonus Vetus OLS (BVU) estimation of gravity equations for bilateral flows.
//!
//! This crate provides:
//! - Input validation and complete-case selection ([`validation`])
//! - Log transforms of distance and income-normalized flows ([`transform`])
//! - Multilateral-resistance aggregation by origin, destination and overall
//!   ([`resistance`]), with simple or income-share weights
//! - MR demeaning of every regressor ([`demean`])
//! - OLS with classical or HC1 standard errors ([`ols`])
//! - The end-to-end driver [`estimate_bvu`] / [`BvuEstimator`]
//!
//! ## Example
//!
//! ```no_run
//! use gravity_core::Dataset;
//! use gravity_inference::{GravitySpec, estimate_bvu};
//!
//! # fn load() -> Dataset { Dataset::new() }
//! let data = load();
//! let spec = GravitySpec::new("iso_o", "iso_d", "flow", "distw", "gdp_o", "gdp_d")
//!     .with_regressors(["rta"]);
//! let summary = estimate_bvu(&spec, true, &data)?;
//! println!("{summary}");
//! # Ok::<(), gravity_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Estimator configuration.
pub mod config;
/// MR demeaning of bilateral variables.
pub mod demean;
/// End-to-end BVU driver.
pub mod estimator;
/// OLS solver with classical / HC1 covariance.
pub mod ols;
/// Origin, destination and global resistance terms.
pub mod resistance;
/// Log transforms of the raw gravity variables.
pub mod transform;
/// Column roles and estimation-sample preparation.
pub mod validation;

pub use config::{BvuConfig, MrWeighting};
pub use demean::{AdjustedVariable, MR_SUFFIX, mr_name};
pub use estimator::{BvuEstimator, MrAdjustedData, estimate_bvu};
pub use ols::{OlsFit, ols_fit};
pub use resistance::{CountryIndex, IncomeShares, MultilateralResistance, ResistanceTerms, Role};
pub use transform::{LOG_DISTANCE, LOG_NORMALIZED_FLOW, NORMALIZED_FLOW};
pub use validation::{EstimationSample, GravitySpec, RESERVED_NAMES, prepare_sample};
