//! Bonus Vetus OLS driver.
//!
//! Pipeline per call: validate names and keep complete cases, log-transform,
//! aggregate resistance terms, demean, then regress
//! `log_normalized_flow` on an intercept, `log_distance_mr` and `<x>_mr` for
//! every additional regressor. Nothing is cached between calls; the input
//! dataset is only read.

use gravity_core::{CoefficientEstimate, Dataset, Error, RegressionSummary, Result};

use crate::config::{BvuConfig, MrWeighting};
use crate::demean::{AdjustedVariable, apply_all};
use crate::ols::{OlsFit, ols_fit};
use crate::resistance::{CountryIndex, IncomeShares, MultilateralResistance};
use crate::transform::{LOG_DISTANCE, LOG_NORMALIZED_FLOW, transform_sample};
use crate::validation::{GravitySpec, prepare_sample};

/// MR-adjusted estimation data, ready for the regression.
#[derive(Debug, Clone)]
pub struct MrAdjustedData {
    /// Dependent variable `log_normalized_flow`, one value per retained row.
    pub response: Vec<f64>,
    /// Adjusted regressors: `log_distance_mr` first, then `<x>_mr` in `GravitySpec` order.
    pub regressors: Vec<AdjustedVariable>,
    /// Country index of the retained rows.
    pub index: CountryIndex,
    /// Source row of each retained row.
    pub source_rows: Vec<usize>,
}

impl MrAdjustedData {
    /// Regression formula, e.g. `log_normalized_flow ~ log_distance_mr + rta_mr`.
    pub fn formula(&self) -> String {
        let rhs: Vec<&str> = self.regressors.iter().map(|r| r.name.as_str()).collect();
        format!("{LOG_NORMALIZED_FLOW} ~ {}", rhs.join(" + "))
    }

    /// Adjusted column by name (`<variable>_mr`).
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.regressors.iter().find(|r| r.name == name).map(|r| r.values.as_slice())
    }
}

/// Bonus Vetus OLS estimator.
#[derive(Debug, Clone, Default)]
pub struct BvuEstimator {
    config: BvuConfig,
}

impl BvuEstimator {
    /// Create an estimator; the configuration is validated up front.
    pub fn new(config: BvuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &BvuConfig {
        &self.config
    }

    /// Build the MR-adjusted data without fitting.
    pub fn adjust(&self, spec: &GravitySpec, data: &Dataset) -> Result<MrAdjustedData> {
        let sample = prepare_sample(spec, data)?;
        let vars = transform_sample(spec, &sample)?;
        let index = CountryIndex::build(&sample.origins, &sample.destinations)?;
        self.check_panel(spec, &index)?;
        log::debug!(
            "BVU sample: {} records, {} origins, {} destinations",
            index.n_records(),
            index.n_origins(),
            index.n_destinations()
        );

        let mut raw: Vec<(&str, &[f64])> = Vec::with_capacity(sample.regressors.len() + 1);
        raw.push((LOG_DISTANCE, vars.log_distance.as_slice()));
        raw.extend(sample.regressors.iter().map(|(name, v)| (name.as_str(), v.as_slice())));

        let shares = match self.config.weighting {
            MrWeighting::Simple => None,
            MrWeighting::IncomeShare => Some(IncomeShares::from_records(
                &index,
                &sample.origin_income,
                &sample.destination_income,
            )?),
        };
        let mr = MultilateralResistance::compute(&index, &raw, self.config.weighting, shares.as_ref())?;
        let regressors = apply_all(&index, &mr, &raw)?;

        Ok(MrAdjustedData {
            response: vars.log_normalized_flow,
            regressors,
            index,
            source_rows: sample.source_rows,
        })
    }

    /// Run the full pipeline and return the regression summary.
    pub fn fit(&self, spec: &GravitySpec, data: &Dataset) -> Result<RegressionSummary> {
        let adjusted = self.adjust(spec, data)?;
        let fit = self.regress(&adjusted)?;
        Ok(summarize(&adjusted, &fit))
    }

    /// Regress the response on the adjusted regressors.
    pub fn regress(&self, adjusted: &MrAdjustedData) -> Result<OlsFit> {
        let names: Vec<String> = adjusted.regressors.iter().map(|r| r.name.clone()).collect();
        let columns: Vec<&[f64]> = adjusted.regressors.iter().map(|r| r.values.as_slice()).collect();
        log::debug!("fitting {}", adjusted.formula());
        ols_fit(
            &names,
            &columns,
            &adjusted.response,
            self.config.covariance_type(),
            self.config.rank_tolerance,
        )
    }

    fn check_panel(&self, spec: &GravitySpec, index: &CountryIndex) -> Result<()> {
        let origin_only = index.origin_only();
        let destination_only = index.destination_only();
        if origin_only.is_empty() && destination_only.is_empty() {
            return Ok(());
        }
        if self.config.strict_panel {
            let mut parts = Vec::new();
            if !origin_only.is_empty() {
                parts.push(format!("countries appear only as origin: {}", origin_only.join(", ")));
            }
            if !destination_only.is_empty() {
                parts.push(format!(
                    "countries appear only as destination: {}",
                    destination_only.join(", ")
                ));
            }
            let column = if origin_only.is_empty() { &spec.destination } else { &spec.origin };
            return Err(Error::data(column, parts.join("; ")));
        }
        log::warn!(
            "panel is not square: {} origin-only and {} destination-only countries",
            origin_only.len(),
            destination_only.len()
        );
        Ok(())
    }
}

fn summarize(adjusted: &MrAdjustedData, fit: &OlsFit) -> RegressionSummary {
    let coefficients = (0..fit.names.len())
        .map(|j| CoefficientEstimate {
            name: fit.names[j].clone(),
            estimate: fit.coefficients[j],
            std_error: fit.std_errors[j],
            t_stat: fit.t_stats[j],
            p_value: fit.p_values[j],
        })
        .collect();

    RegressionSummary {
        formula: adjusted.formula(),
        coefficients,
        covariance_type: fit.covariance_type,
        n_obs: fit.n_obs,
        n_origins: adjusted.index.n_origins(),
        n_destinations: adjusted.index.n_destinations(),
        df_model: fit.df_model,
        df_residual: fit.df_residual,
        r_squared: fit.r_squared,
        adj_r_squared: fit.adj_r_squared,
        sigma: fit.sigma,
        f_stat: fit.f_stat,
        f_p_value: fit.f_p_value,
    }
}

/// Estimate a gravity equation by Bonus Vetus OLS.
///
/// The dependent variable is `ln(flow / (income_o · income_d))`; the
/// regressors are `ln(distance)` and every column in `spec.regressors`, each
/// MR-adjusted with simple means. `robust` selects HC1 standard errors.
pub fn estimate_bvu(spec: &GravitySpec, robust: bool, data: &Dataset) -> Result<RegressionSummary> {
    BvuEstimator::new(BvuConfig::default().with_robust(robust))?.fit(spec, data)
}
