//! Estimator configuration.

use gravity_core::{CovarianceType, Error, Result};
use serde::{Deserialize, Serialize};

/// How the multilateral-resistance terms average over trading partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrWeighting {
    /// Arithmetic means over partners (Bonus Vetus OLS).
    #[default]
    Simple,
    /// Partner terms weighted by world-income shares (Bonus Vetus weighted).
    IncomeShare,
}

/// Configuration for [`crate::BvuEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvuConfig {
    /// Report HC1 heteroskedasticity-robust standard errors (default: true).
    pub robust: bool,
    /// Averaging scheme for the resistance terms (default: simple means).
    pub weighting: MrWeighting,
    /// Reject datasets in which some country is only ever an origin or only
    /// ever a destination (default: false, which logs a warning instead).
    pub strict_panel: bool,
    /// Singular values below `rank_tolerance * s_max` count as zero when
    /// checking the design matrix rank (default: 1e-10).
    pub rank_tolerance: f64,
}

impl Default for BvuConfig {
    fn default() -> Self {
        Self { robust: true, weighting: MrWeighting::Simple, strict_panel: false, rank_tolerance: 1e-10 }
    }
}

impl BvuConfig {
    /// Set the robust flag.
    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Set the weighting scheme.
    pub fn with_weighting(mut self, weighting: MrWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Require every country to appear as both origin and destination.
    pub fn with_strict_panel(mut self, strict: bool) -> Self {
        self.strict_panel = strict;
        self
    }

    /// Set the relative rank tolerance.
    pub fn with_rank_tolerance(mut self, tol: f64) -> Self {
        self.rank_tolerance = tol;
        self
    }

    /// Covariance flavour implied by `robust`.
    pub fn covariance_type(&self) -> CovarianceType {
        if self.robust { CovarianceType::HC1 } else { CovarianceType::Classical }
    }

    /// Check settings before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if !self.rank_tolerance.is_finite() || self.rank_tolerance <= 0.0 || self.rank_tolerance >= 1.0 {
            return Err(Error::Configuration(format!(
                "rank_tolerance must be in (0, 1), got {}",
                self.rank_tolerance
            )));
        }
        Ok(())
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(Error::from)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BvuConfig::default();
        assert!(cfg.robust);
        assert_eq!(cfg.weighting, MrWeighting::Simple);
        assert!(!cfg.strict_panel);
        assert_eq!(cfg.covariance_type(), CovarianceType::HC1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let cfg = BvuConfig::default()
            .with_robust(false)
            .with_weighting(MrWeighting::IncomeShare)
            .with_strict_panel(true);
        assert_eq!(cfg.covariance_type(), CovarianceType::Classical);
        assert_eq!(cfg.weighting, MrWeighting::IncomeShare);
        assert!(cfg.strict_panel);
    }

    #[test]
    fn test_bad_tolerance() {
        for tol in [0.0, -1.0, f64::NAN, 1.0] {
            let err = BvuConfig::default().with_rank_tolerance(tol).validate().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
        }
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = BvuConfig::from_json(r#"{"robust": false, "weighting": "income_share"}"#).unwrap();
        assert!(!cfg.robust);
        assert_eq!(cfg.weighting, MrWeighting::IncomeShare);
        assert_eq!(cfg.rank_tolerance, 1e-10);
        assert!(BvuConfig::from_json(r#"{"rank_tolerance": 2.0}"#).is_err());
        assert!(matches!(BvuConfig::from_json("{"), Err(Error::Json(_))));
    }
}
