//! Ordinary least squares with classical or HC1 standard errors.
//!
//! The design always carries an intercept column. Before solving, the rank of
//! `X` is checked through its singular values, so a rank-deficient design
//! (for example too few countries for the number of regressors) surfaces as
//! [`Error::Computation`] instead of a meaningless inverse.
//!
//! HC1 covariance: `V = n/(n-k) · (X'X)^{-1} (Σ_i e_i² x_i x_i') (X'X)^{-1}`,
//! the convention of Stata's `regress, robust`.
//!
//! # References
//!
//! - White (1980), "A Heteroskedasticity-Consistent Covariance Matrix
//!   Estimator and a Direct Test for Heteroskedasticity." *Econometrica*.
//! - MacKinnon & White (1985), *Journal of Econometrics* 29(3).

use gravity_core::{CovarianceType, Error, INTERCEPT, Result};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Fitted OLS model.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Coefficient names, intercept first.
    pub names: Vec<String>,
    /// Coefficient estimates.
    pub coefficients: Vec<f64>,
    /// Standard errors of the requested flavour.
    pub std_errors: Vec<f64>,
    /// t-statistics.
    pub t_stats: Vec<f64>,
    /// Two-sided p-values.
    pub p_values: Vec<f64>,
    /// Coefficient covariance matrix (k × k).
    pub covariance: DMatrix<f64>,
    /// Covariance flavour.
    pub covariance_type: CovarianceType,
    /// Residuals `y - Xβ`.
    pub residuals: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Total (centered) sum of squares.
    pub tss: f64,
    /// R².
    pub r_squared: f64,
    /// Adjusted R².
    pub adj_r_squared: f64,
    /// Residual standard error.
    pub sigma: f64,
    /// Overall F (Wald F under HC1).
    pub f_stat: f64,
    /// p-value of `f_stat`.
    pub f_p_value: f64,
    /// Number of observations.
    pub n_obs: usize,
    /// Regressors excluding the intercept.
    pub df_model: usize,
    /// `n - k`.
    pub df_residual: usize,
}

/// Fit `y ~ 1 + columns` by OLS.
///
/// # Arguments
///
/// - `names`: regressor names (one per column, intercept excluded).
/// - `columns`: regressor values, column-major, each of length n.
/// - `y`: response (length n).
/// - `covariance_type`: classical or HC1 standard errors.
/// - `rank_tol`: singular values below `rank_tol · s_max` count as zero.
pub fn ols_fit(
    names: &[String],
    columns: &[&[f64]],
    y: &[f64],
    covariance_type: CovarianceType,
    rank_tol: f64,
) -> Result<OlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Computation("y must be non-empty".into()));
    }
    if names.len() != columns.len() {
        return Err(Error::Computation(format!(
            "{} regressor names for {} columns",
            names.len(),
            columns.len()
        )));
    }
    if let Some((j, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != n) {
        return Err(Error::Computation(format!(
            "column `{}` has length {}, expected {}",
            names[j],
            c.len(),
            n
        )));
    }
    let k = columns.len() + 1;
    if n <= k {
        return Err(Error::Computation(format!(
            "{n} observations leave no residual degrees of freedom for {k} coefficients"
        )));
    }
    if y.iter().chain(columns.iter().flat_map(|c| c.iter())).any(|v| !v.is_finite()) {
        return Err(Error::Computation("design matrix or response contains non-finite values".into()));
    }

    let x = DMatrix::from_fn(n, k, |i, j| if j == 0 { 1.0 } else { columns[j - 1][i] });
    let y_vec = DVector::from_column_slice(y);

    let rank = numerical_rank(&x, rank_tol);
    if rank < k {
        return Err(Error::Computation(format!(
            "design matrix is rank-deficient (rank {rank} < {k} columns); \
             regressors are collinear after the multilateral-resistance adjustment"
        )));
    }

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y_vec;
    let xtx_inv = xtx.try_inverse().ok_or_else(|| Error::Computation("X'X is singular".into()))?;

    let beta = &xtx_inv * &xty;
    let resid = &y_vec - &x * &beta;
    let rss: f64 = resid.iter().map(|r| r * r).sum();
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();

    let df_residual = n - k;
    let df_model = k - 1;
    let sigma2 = rss / df_residual as f64;

    let covariance = match covariance_type {
        CovarianceType::Classical => &xtx_inv * sigma2,
        CovarianceType::HC1 => hc1_covariance(&x, &resid, &xtx_inv),
    };

    let coefficients: Vec<f64> = beta.iter().copied().collect();
    let std_errors: Vec<f64> = (0..k).map(|j| covariance[(j, j)].max(0.0).sqrt()).collect();
    let t_stats: Vec<f64> = coefficients.iter().zip(&std_errors).map(|(b, se)| b / se).collect();

    let t_dist = StudentsT::new(0.0, 1.0, df_residual as f64)
        .map_err(|e| Error::Computation(format!("t distribution: {e}")))?;
    let p_values: Vec<f64> = t_stats
        .iter()
        .map(|t| if t.is_nan() { f64::NAN } else { 2.0 * t_dist.sf(t.abs()) })
        .collect();

    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_residual as f64;

    let f_stat = match covariance_type {
        CovarianceType::Classical => ((tss - rss) / df_model as f64) / sigma2,
        CovarianceType::HC1 => wald_f(&beta, &covariance)?,
    };
    let f_dist = FisherSnedecor::new(df_model as f64, df_residual as f64)
        .map_err(|e| Error::Computation(format!("F distribution: {e}")))?;
    let f_p_value = if f_stat.is_nan() {
        f64::NAN
    } else if f_stat.is_infinite() {
        0.0
    } else {
        f_dist.sf(f_stat)
    };

    let mut out_names = Vec::with_capacity(k);
    out_names.push(INTERCEPT.to_string());
    out_names.extend(names.iter().cloned());

    Ok(OlsFit {
        names: out_names,
        coefficients,
        std_errors,
        t_stats,
        p_values,
        covariance,
        covariance_type,
        residuals: resid.iter().copied().collect(),
        rss,
        tss,
        r_squared,
        adj_r_squared,
        sigma: sigma2.sqrt(),
        f_stat,
        f_p_value,
        n_obs: n,
        df_model,
        df_residual,
    })
}

/// HC1 sandwich covariance.
pub fn hc1_covariance(x: &DMatrix<f64>, residuals: &DVector<f64>, xtx_inv: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let k = x.ncols();

    // Meat: Σ_i e_i² x_i x_i' = (diag(e) X)' (diag(e) X)
    let mut xe = x.clone();
    for i in 0..n {
        let e = residuals[i];
        for j in 0..k {
            xe[(i, j)] *= e;
        }
    }
    let meat = xe.transpose() * &xe;

    let correction = n as f64 / (n - k) as f64;
    (xtx_inv * meat) * xtx_inv * correction
}

/// Number of singular values of `x` above `tol · s_max`.
pub fn numerical_rank(x: &DMatrix<f64>, tol: f64) -> usize {
    let sv = x.clone().svd(false, false).singular_values;
    let s_max = sv.iter().copied().fold(0.0_f64, f64::max);
    if s_max == 0.0 {
        return 0;
    }
    sv.iter().filter(|&&s| s > tol * s_max).count()
}

// Joint Wald test that all slopes are zero, scaled to an F statistic.
fn wald_f(beta: &DVector<f64>, covariance: &DMatrix<f64>) -> Result<f64> {
    let q = beta.len() - 1;
    let b = beta.rows(1, q).clone_owned();
    let v = covariance.view((1, 1), (q, q)).clone_owned();
    let v_inv = v
        .try_inverse()
        .ok_or_else(|| Error::Computation("robust covariance of the slopes is singular".into()))?;
    let w = (b.transpose() * v_inv * &b)[(0, 0)];
    Ok(w / q as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_fit() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let fit = ols_fit(&names(&["x"]), &[&x[..]], &y, CovarianceType::Classical, 1e-10).unwrap();
        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 1e-10);
        assert!(fit.rss < 1e-20);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_eq!(fit.names, vec!["(Intercept)", "x"]);
        assert_eq!(fit.df_residual, 3);
        assert_eq!(fit.df_model, 1);
    }

    #[test]
    fn test_classical_se_matches_textbook() {
        // Simple regression: se(b1) = s / sqrt(Sxx).
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.1, 1.9, 3.2, 3.8, 5.3, 5.9];
        let fit = ols_fit(&names(&["x"]), &[&x[..]], &y, CovarianceType::Classical, 1e-10).unwrap();
        let x_mean = 3.5;
        let sxx: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
        let s = (fit.rss / 4.0).sqrt();
        assert_relative_eq!(fit.std_errors[1], s / sxx.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.sigma, s, epsilon = 1e-12);
        assert_relative_eq!(fit.t_stats[1], fit.coefficients[1] / fit.std_errors[1], epsilon = 1e-12);
        assert!(fit.p_values[1] < 1e-4);
        // Single-slope F equals t².
        assert_relative_eq!(fit.f_stat, fit.t_stats[1].powi(2), epsilon = 1e-8);
        assert_relative_eq!(fit.f_p_value, fit.p_values[1], epsilon = 1e-8);
    }

    #[test]
    fn test_hc1_simple_regression() {
        // For y ~ 1 + x: Var_HC0(b1) = Σ (x_i - x̄)² e_i² / Sxx², HC1 scales by n/(n-2).
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = [2.0, 2.5, 4.1, 4.0, 6.2, 5.8, 8.5];
        let fit = ols_fit(&names(&["x"]), &[&x[..]], &y, CovarianceType::HC1, 1e-10).unwrap();
        let x_mean = 4.0;
        let sxx: f64 = x.iter().map(|v| (v - x_mean).powi(2)).sum();
        let num: f64 =
            x.iter().zip(&fit.residuals).map(|(xi, e)| (xi - x_mean).powi(2) * e * e).sum();
        let expected = (num / (sxx * sxx) * 7.0 / 5.0).sqrt();
        assert_relative_eq!(fit.std_errors[1], expected, epsilon = 1e-10);
        assert_eq!(fit.covariance_type, CovarianceType::HC1);
        // Wald F with one restriction is the squared robust t.
        assert_relative_eq!(fit.f_stat, fit.t_stats[1].powi(2), epsilon = 1e-8);
    }

    #[test]
    fn test_robust_and_classical_share_coefficients() {
        let x1 = [0.3, -1.2, 2.2, 0.7, -0.4, 1.9, -2.1, 0.05];
        let x2 = [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let y = [0.5, -2.0, 4.1, 1.9, -0.2, 2.8, -3.5, 0.6];
        let nm = names(&["x1", "x2"]);
        let a = ols_fit(&nm, &[&x1[..], &x2[..]], &y, CovarianceType::Classical, 1e-10).unwrap();
        let b = ols_fit(&nm, &[&x1[..], &x2[..]], &y, CovarianceType::HC1, 1e-10).unwrap();
        for (ca, cb) in a.coefficients.iter().zip(&b.coefficients) {
            assert_relative_eq!(ca, cb, epsilon = 1e-12);
        }
        assert!((a.std_errors[1] - b.std_errors[1]).abs() > 1e-9);
    }

    #[test]
    fn test_rank_deficient() {
        let x1 = [1.0, 2.0, 3.0, 4.0];
        let x2 = [2.0, 4.0, 6.0, 8.0];
        let y = [1.0, 3.0, 2.0, 5.0];
        let err = ols_fit(&names(&["a", "b"]), &[&x1[..], &x2[..]], &y, CovarianceType::Classical, 1e-10)
            .unwrap_err();
        assert!(matches!(err, Error::Computation(ref m) if m.contains("rank-deficient")));

        // A constant regressor duplicates the intercept.
        let c = [5.0; 4];
        assert!(ols_fit(&names(&["c"]), &[&c[..]], &y, CovarianceType::HC1, 1e-10).is_err());
    }

    #[test]
    fn test_too_few_observations() {
        let x = [1.0, 2.0];
        let y = [1.0, 2.0];
        assert!(matches!(
            ols_fit(&names(&["x"]), &[&x[..]], &y, CovarianceType::Classical, 1e-10),
            Err(Error::Computation(_))
        ));
    }

    #[test]
    fn test_numerical_rank() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert_eq!(numerical_rank(&m, 1e-10), 1);
        assert_eq!(numerical_rank(&DMatrix::identity(3, 3), 1e-10), 3);
        assert_eq!(numerical_rank(&DMatrix::zeros(2, 2), 1e-10), 0);
    }
}
