//! Column specification and estimation-sample preparation.
//!
//! [`GravitySpec`] names the dataset columns that play each role in the
//! gravity equation. [`prepare_sample`] resolves every name to a typed column
//! once, checks the names against the derived-variable namespace, and keeps
//! the complete cases: rows where every used column is observed.

use std::collections::HashSet;

use gravity_core::{Dataset, Error, INTERCEPT, Result};

use crate::demean::MR_SUFFIX;
use crate::transform::{LOG_DISTANCE, LOG_NORMALIZED_FLOW, NORMALIZED_FLOW};

/// Names that regressors may not use, since derived columns live under them.
pub const RESERVED_NAMES: &[&str] = &[
    "dist_log",
    "y_inc",
    "y_inc_log",
    "count",
    LOG_DISTANCE,
    NORMALIZED_FLOW,
    LOG_NORMALIZED_FLOW,
    INTERCEPT,
];

/// Column roles of a gravity regression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GravitySpec {
    /// Origin country code (text).
    pub origin: String,
    /// Destination country code (text).
    pub destination: String,
    /// Bilateral flow, the dependent variable before normalization.
    pub flow: String,
    /// Bilateral distance.
    pub distance: String,
    /// Income of the origin country.
    pub origin_income: String,
    /// Income of the destination country.
    pub destination_income: String,
    /// Additional bilateral regressors, in formula order.
    pub regressors: Vec<String>,
}

impl GravitySpec {
    /// Create a column mapping with no additional regressors.
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        flow: impl Into<String>,
        distance: impl Into<String>,
        origin_income: impl Into<String>,
        destination_income: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            flow: flow.into(),
            distance: distance.into(),
            origin_income: origin_income.into(),
            destination_income: destination_income.into(),
            regressors: Vec::new(),
        }
    }

    /// Set the additional regressors.
    pub fn with_regressors<S: Into<String>>(mut self, regressors: impl IntoIterator<Item = S>) -> Self {
        self.regressors = regressors.into_iter().map(Into::into).collect();
        self
    }

    /// Check names for collisions before touching any data.
    pub fn check_names(&self) -> Result<()> {
        let roles = [
            ("origin", &self.origin),
            ("destination", &self.destination),
            ("flow", &self.flow),
            ("distance", &self.distance),
            ("origin income", &self.origin_income),
            ("destination income", &self.destination_income),
        ];
        for (role, name) in roles {
            if name.is_empty() {
                return Err(Error::Configuration(format!("{role} column name is empty")));
            }
        }
        if self.origin == self.destination {
            return Err(Error::Configuration(format!(
                "origin and destination both use column `{}`",
                self.origin
            )));
        }

        let mut seen = HashSet::with_capacity(self.regressors.len());
        for r in &self.regressors {
            if r.is_empty() {
                return Err(Error::Configuration("regressor name is empty".into()));
            }
            if RESERVED_NAMES.contains(&r.as_str()) {
                return Err(Error::Configuration(format!(
                    "regressor `{r}` collides with a reserved derived-variable name"
                )));
            }
            if r.ends_with(MR_SUFFIX) {
                return Err(Error::Configuration(format!(
                    "regressor `{r}` ends in `{MR_SUFFIX}`, which is reserved for adjusted variables"
                )));
            }
            if !seen.insert(r.as_str()) {
                return Err(Error::Configuration(format!("regressor `{r}` is listed twice")));
            }
            if let Some((role, _)) = roles.iter().find(|(role, name)| *role != "distance" && *name == r) {
                return Err(Error::Configuration(format!(
                    "regressor `{r}` is also the {role} column"
                )));
            }
        }
        Ok(())
    }

    /// Ordered names of the variables that receive the MR adjustment.
    pub fn adjusted_variables(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.regressors.len() + 1);
        out.push(LOG_DISTANCE.to_string());
        out.extend(self.regressors.iter().cloned());
        out
    }
}

/// Complete-case rows of the used columns, owned and ready for transformation.
#[derive(Debug, Clone)]
pub struct EstimationSample {
    /// Origin code per row.
    pub origins: Vec<String>,
    /// Destination code per row.
    pub destinations: Vec<String>,
    /// Flow per row.
    pub flow: Vec<f64>,
    /// Distance per row.
    pub distance: Vec<f64>,
    /// Origin income per row.
    pub origin_income: Vec<f64>,
    /// Destination income per row.
    pub destination_income: Vec<f64>,
    /// `(name, values)` per additional regressor, in `GravitySpec` order.
    pub regressors: Vec<(String, Vec<f64>)>,
    /// Source row index of each retained row.
    pub source_rows: Vec<usize>,
}

impl EstimationSample {
    /// Number of retained rows.
    pub fn len(&self) -> usize {
        self.flow.len()
    }

    /// `true` when no rows were retained.
    pub fn is_empty(&self) -> bool {
        self.flow.is_empty()
    }
}

/// Resolve the column mapping against `data` and keep complete cases.
///
/// Fails with [`Error::Configuration`] on name collisions and with
/// [`Error::Data`] when a column is missing, has the wrong type, holds an
/// infinite regressor value, or when no complete row remains.
pub fn prepare_sample(spec: &GravitySpec, data: &Dataset) -> Result<EstimationSample> {
    spec.check_names()?;

    let origin = data.text(&spec.origin)?;
    let destination = data.text(&spec.destination)?;
    let flow = data.numeric(&spec.flow)?;
    let distance = data.numeric(&spec.distance)?;
    let origin_income = data.numeric(&spec.origin_income)?;
    let destination_income = data.numeric(&spec.destination_income)?;
    let regressors =
        spec.regressors.iter().map(|r| data.numeric(r)).collect::<Result<Vec<_>>>()?;

    if data.is_empty() {
        return Err(Error::data(&spec.flow, "dataset has no rows"));
    }

    let numeric: Vec<_> = [flow, distance, origin_income, destination_income]
        .into_iter()
        .chain(regressors.iter().copied())
        .collect();

    for col in &regressors {
        if let Some(i) = col.values().iter().position(|v| v.is_infinite()) {
            return Err(Error::data(col.name(), format!("value at row {i} is infinite")));
        }
    }

    let n = data.n_rows();
    let mut missing = vec![0usize; numeric.len() + 2];
    let mut keep = Vec::with_capacity(n);
    for i in 0..n {
        let mut complete = true;
        for (slot, observed) in
            [origin.is_observed(i), destination.is_observed(i)].into_iter().enumerate()
        {
            if !observed {
                missing[slot] += 1;
                complete = false;
            }
        }
        for (j, col) in numeric.iter().enumerate() {
            if !col.is_observed(i) {
                missing[j + 2] += 1;
                complete = false;
            }
        }
        if complete {
            keep.push(i);
        }
    }

    if keep.is_empty() {
        let (worst, _) = missing.iter().enumerate().max_by_key(|&(_, m)| *m).unwrap_or((0, &0));
        let column = match worst {
            0 => origin.name(),
            1 => destination.name(),
            j => numeric[j - 2].name(),
        };
        return Err(Error::data(column, "no complete rows remain after dropping missing values"));
    }
    if keep.len() < n {
        log::warn!("dropped {} of {} rows with missing values in model columns", n - keep.len(), n);
    }
    log::debug!("estimation sample: {} rows", keep.len());

    let pick = |v: &[f64]| keep.iter().map(|&i| v[i]).collect::<Vec<f64>>();
    let pick_text = |v: &[String]| keep.iter().map(|&i| v[i].clone()).collect::<Vec<String>>();

    Ok(EstimationSample {
        origins: pick_text(origin.values()),
        destinations: pick_text(destination.values()),
        flow: pick(flow.values()),
        distance: pick(distance.values()),
        origin_income: pick(origin_income.values()),
        destination_income: pick(destination_income.values()),
        regressors: regressors.iter().map(|c| (c.name().to_string(), pick(c.values()))).collect(),
        source_rows: keep,
    })
}
