//! Common result types for gravity estimation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Name used for the intercept row of a coefficient table.
pub const INTERCEPT: &str = "(Intercept)";

/// How coefficient standard errors were computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceType {
    /// Homoskedastic OLS covariance `s² (X'X)^{-1}`.
    Classical,
    /// White sandwich with the `n / (n - k)` small-sample factor (Stata `robust`).
    HC1,
}

impl CovarianceType {
    /// Short label used in printed summaries.
    pub fn label(&self) -> &'static str {
        match self {
            CovarianceType::Classical => "classical",
            CovarianceType::HC1 => "HC1",
        }
    }
}

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    /// Regressor name (`(Intercept)` for the constant).
    pub name: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error (classical or robust, see [`RegressionSummary::covariance_type`]).
    pub std_error: f64,
    /// t-statistic `estimate / std_error`.
    pub t_stat: f64,
    /// Two-sided p-value from Student-t with the residual degrees of freedom.
    pub p_value: f64,
}

/// Summary of a fitted Bonus Vetus OLS regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    /// Model formula, e.g. `log_normalized_flow ~ log_distance_mr + rta_mr`.
    pub formula: String,
    /// Coefficient table: intercept first, then regressors in formula order.
    pub coefficients: Vec<CoefficientEstimate>,
    /// Standard-error flavour.
    pub covariance_type: CovarianceType,
    /// Number of observations used in the fit.
    pub n_obs: usize,
    /// Distinct origin countries in the estimation sample.
    pub n_origins: usize,
    /// Distinct destination countries in the estimation sample.
    pub n_destinations: usize,
    /// Model degrees of freedom (regressors excluding the intercept).
    pub df_model: usize,
    /// Residual degrees of freedom `n - k`.
    pub df_residual: usize,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Adjusted R².
    pub adj_r_squared: f64,
    /// Residual standard error `sqrt(RSS / df_residual)`.
    pub sigma: f64,
    /// Overall F statistic (Wald F when robust).
    pub f_stat: f64,
    /// p-value of `f_stat` on `(df_model, df_residual)`.
    pub f_p_value: f64,
}

impl RegressionSummary {
    /// Whether heteroskedasticity-robust standard errors were reported.
    pub fn robust(&self) -> bool {
        self.covariance_type == CovarianceType::HC1
    }

    /// Look up a coefficient row by name.
    pub fn coefficient(&self, name: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Point estimates in table order.
    pub fn estimates(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON produced by [`RegressionSummary::to_json`].
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl fmt::Display for RegressionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bonus Vetus OLS: {}", self.formula)?;
        writeln!(
            f,
            "Observations: {}   Origins: {}   Destinations: {}   SE: {}",
            self.n_obs,
            self.n_origins,
            self.n_destinations,
            self.covariance_type.label()
        )?;
        let width = self.coefficients.iter().map(|c| c.name.len()).max().unwrap_or(0).max(8);
        writeln!(
            f,
            "{:<width$} {:>12} {:>12} {:>9} {:>9}",
            "", "Estimate", "Std. Error", "t value", "Pr(>|t|)"
        )?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<width$} {:>12.6} {:>12.6} {:>9.3} {:>9.4}",
                c.name, c.estimate, c.std_error, c.t_stat, c.p_value
            )?;
        }
        writeln!(
            f,
            "Residual standard error: {:.4} on {} degrees of freedom",
            self.sigma, self.df_residual
        )?;
        writeln!(f, "R-squared: {:.4}   Adjusted R-squared: {:.4}", self.r_squared, self.adj_r_squared)?;
        write!(
            f,
            "F-statistic: {:.3} on {} and {} DF, p-value: {:.4}",
            self.f_stat, self.df_model, self.df_residual, self.f_p_value
        )
    }
}
