//! Multilateral-resistance demeaning.
//!
//! `adjusted(r, V) = V_r - (origin_term[V][o(r)] + destination_term[V][d(r)] - global[V])`
//!
//! Each record and each variable is independent once the resistance tables
//! exist, so variables are demeaned in parallel.

use gravity_core::{Error, Result};
use rayon::prelude::*;

use crate::resistance::{CountryIndex, MultilateralResistance, ResistanceTerms};

/// Suffix appended to the name of an MR-adjusted variable.
pub const MR_SUFFIX: &str = "_mr";

/// Name of the adjusted counterpart of `variable`.
pub fn mr_name(variable: &str) -> String {
    format!("{variable}{MR_SUFFIX}")
}

/// One MR-adjusted column.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedVariable {
    /// Adjusted name (`<variable>_mr`).
    pub name: String,
    /// Adjusted values, aligned with the index records.
    pub values: Vec<f64>,
}

/// Demean `raw` with `terms`.
pub fn demean(index: &CountryIndex, terms: &ResistanceTerms, raw: &[f64]) -> Result<Vec<f64>> {
    if raw.len() != index.n_records() {
        return Err(Error::data(
            terms.variable(),
            format!("has {} values, expected {}", raw.len(), index.n_records()),
        ));
    }
    raw.iter()
        .enumerate()
        .map(|(i, &v)| Ok(v - terms.correction(i, index)?))
        .collect()
}

/// Demean every `(name, values)` pair with its terms from `mr`.
///
/// Output columns follow input order. A variable without terms is an error.
pub fn apply_all(
    index: &CountryIndex,
    mr: &MultilateralResistance,
    variables: &[(&str, &[f64])],
) -> Result<Vec<AdjustedVariable>> {
    variables
        .par_iter()
        .map(|&(name, values)| {
            let terms = mr
                .get(name)
                .ok_or_else(|| Error::data(name, "no resistance terms computed for variable"))?;
            Ok(AdjustedVariable { name: mr_name(name), values: demean(index, terms, values)? })
        })
        .collect()
}
