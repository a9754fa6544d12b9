//! Log transforms of the raw gravity variables.
//!
//! `log_distance = ln(distance)` and
//! `log_normalized_flow = ln(flow / (income_origin * income_destination))`.
//! Non-positive inputs are rejected per row rather than turned into `NaN`, so a
//! bad row can never leak into the shared resistance means. The dependent
//! variable is formed as `ln(flow) - ln(income_o) - ln(income_d)`, which stays
//! finite for any valid row even when the ratio itself leaves `f64` range.

use gravity_core::{Error, Result};

use crate::validation::{EstimationSample, GravitySpec};

/// Name of the log-distance variable.
pub const LOG_DISTANCE: &str = "log_distance";
/// Name of the income-normalized flow.
pub const NORMALIZED_FLOW: &str = "normalized_flow";
/// Name of the dependent variable.
pub const LOG_NORMALIZED_FLOW: &str = "log_normalized_flow";

/// Raw inputs of one bilateral record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    /// Bilateral flow.
    pub flow: f64,
    /// Bilateral distance.
    pub distance: f64,
    /// Origin income.
    pub origin_income: f64,
    /// Destination income.
    pub destination_income: f64,
}

/// Which raw input broke the positivity requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawField {
    /// The flow value.
    Flow,
    /// The distance value.
    Distance,
    /// The origin income.
    OriginIncome,
    /// The destination income.
    DestinationIncome,
}

/// Transformed variables of one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformedRecord {
    /// `ln(distance)`.
    pub log_distance: f64,
    /// `flow / (income_o * income_d)`; saturates to `0` or `inf` outside `f64`
    /// range.
    pub normalized_flow: f64,
    /// `ln(normalized_flow)`.
    pub log_normalized_flow: f64,
}

impl RawRecord {
    /// Apply the log transforms, or report the first field that is not a
    /// finite positive number.
    pub fn transform(&self) -> std::result::Result<TransformedRecord, RawField> {
        let checks = [
            (RawField::Flow, self.flow),
            (RawField::Distance, self.distance),
            (RawField::OriginIncome, self.origin_income),
            (RawField::DestinationIncome, self.destination_income),
        ];
        if let Some((field, _)) = checks.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(*field);
        }

        let log_normalized_flow =
            self.flow.ln() - self.origin_income.ln() - self.destination_income.ln();
        Ok(TransformedRecord {
            log_distance: self.distance.ln(),
            normalized_flow: log_normalized_flow.exp(),
            log_normalized_flow,
        })
    }
}

/// Column-wise transformed variables for a whole sample.
#[derive(Debug, Clone, Default)]
pub struct GravityVariables {
    /// `ln(distance)` per row.
    pub log_distance: Vec<f64>,
    /// Normalized flow per row.
    pub normalized_flow: Vec<f64>,
    /// Dependent variable per row.
    pub log_normalized_flow: Vec<f64>,
}

/// Transform every row of `sample`; the first offending row aborts the call
/// with an [`Error::Data`] naming the dataset column and source row.
pub fn transform_sample(spec: &GravitySpec, sample: &EstimationSample) -> Result<GravityVariables> {
    let n = sample.len();
    let mut out = GravityVariables {
        log_distance: Vec::with_capacity(n),
        normalized_flow: Vec::with_capacity(n),
        log_normalized_flow: Vec::with_capacity(n),
    };

    for i in 0..n {
        let raw = RawRecord {
            flow: sample.flow[i],
            distance: sample.distance[i],
            origin_income: sample.origin_income[i],
            destination_income: sample.destination_income[i],
        };
        let t = raw.transform().map_err(|field| {
            let (column, value) = match field {
                RawField::Flow => (&spec.flow, raw.flow),
                RawField::Distance => (&spec.distance, raw.distance),
                RawField::OriginIncome => (&spec.origin_income, raw.origin_income),
                RawField::DestinationIncome => (&spec.destination_income, raw.destination_income),
            };
            Error::data(
                column,
                format!(
                    "value {value} at row {} cannot be log-transformed (must be finite and strictly positive)",
                    sample.source_rows[i]
                ),
            )
        })?;
        out.log_distance.push(t.log_distance);
        out.normalized_flow.push(t.normalized_flow);
        out.log_normalized_flow.push(t.log_normalized_flow);
    }
    Ok(out)
}
