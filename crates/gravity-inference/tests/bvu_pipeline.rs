//! End-to-end tests of the Bonus Vetus OLS pipeline on synthetic panels.
//!
//! Data are drawn from
//! `ln(flow / (gdp_o · gdp_d)) = a_o + b_d - 1.0 · ln(dist) + 0.5 · rta + ε`
//! with arbitrary origin / destination effects `a`, `b`. On a complete panel
//! (self-pairs included) the MR adjustment removes `a` and `b` exactly.

use approx::assert_relative_eq;
use gravity_core::{Dataset, Error, RegressionSummary};
use gravity_inference::{BvuConfig, BvuEstimator, GravitySpec, MrWeighting, estimate_bvu};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

const BETA_DIST: f64 = -1.0;
const BETA_RTA: f64 = 0.5;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct PanelOptions {
    n_countries: usize,
    self_pairs: bool,
    noise_sd: f64,
    seed: u64,
}

fn generate_panel(opts: &PanelOptions) -> Dataset {
    let mut rng = rand::rngs::StdRng::seed_from_u64(opts.seed);
    let eps = Normal::new(0.0, opts.noise_sd).unwrap();
    let n_c = opts.n_countries;

    let gdp: Vec<f64> = (0..n_c).map(|_| rng.gen_range(1.0..100.0)).collect();
    let a: Vec<f64> = (0..n_c).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let b: Vec<f64> = (0..n_c).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let coords: Vec<(f64, f64)> =
        (0..n_c).map(|_| (rng.gen_range(0.0..50.0), rng.gen_range(0.0..50.0))).collect();

    let mut origin = Vec::new();
    let mut destination = Vec::new();
    let (mut flow, mut dist, mut gdp_o, mut gdp_d, mut rta) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());

    for i in 0..n_c {
        for j in 0..n_c {
            if i == j && !opts.self_pairs {
                continue;
            }
            let (dx, dy) = (coords[i].0 - coords[j].0, coords[i].1 - coords[j].1);
            let d = 1.0 + (dx * dx + dy * dy).sqrt();
            let r = if rng.gen_range(0.0..1.0) < 0.3 { 1.0 } else { 0.0 };
            let noise = eps.sample(&mut rng);
            let ln_norm = a[i] + b[j] + BETA_DIST * d.ln() + BETA_RTA * r + noise;

            origin.push(format!("C{i:02}"));
            destination.push(format!("C{j:02}"));
            flow.push(ln_norm.exp() * gdp[i] * gdp[j]);
            dist.push(d);
            gdp_o.push(gdp[i]);
            gdp_d.push(gdp[j]);
            rta.push(r);
        }
    }

    Dataset::new()
        .with_text("iso_o", origin)
        .unwrap()
        .with_text("iso_d", destination)
        .unwrap()
        .with_numeric("flow", flow)
        .unwrap()
        .with_numeric("distw", dist)
        .unwrap()
        .with_numeric("gdp_o", gdp_o)
        .unwrap()
        .with_numeric("gdp_d", gdp_d)
        .unwrap()
        .with_numeric("rta", rta)
        .unwrap()
}

fn spec() -> GravitySpec {
    GravitySpec::new("iso_o", "iso_d", "flow", "distw", "gdp_o", "gdp_d").with_regressors(["rta"])
}

/// Copy of `ds` with one numeric column replaced.
fn replace_numeric(ds: &Dataset, name: &str, values: Vec<f64>) -> Dataset {
    let mut out = Dataset::new();
    for col in ds.column_names() {
        out = if col == name {
            out.with_numeric(col.clone(), values.clone()).unwrap()
        } else if let Ok(t) = ds.text(col) {
            out.with_text(col.clone(), t.values().to_vec()).unwrap()
        } else {
            out.with_numeric(col.clone(), ds.numeric(col).unwrap().values().to_vec()).unwrap()
        };
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn example_scenario_formula_and_rows() {
    let ds = generate_panel(&PanelOptions { n_countries: 8, self_pairs: false, noise_sd: 0.1, seed: 1 });
    let s = estimate_bvu(&spec(), true, &ds).unwrap();
    assert_eq!(s.formula, "log_normalized_flow ~ log_distance_mr + rta_mr");
    assert_eq!(s.coefficients.len(), 3);
    let names: Vec<&str> = s.coefficients.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["(Intercept)", "log_distance_mr", "rta_mr"]);
    assert!(s.robust());
    assert_eq!(s.n_obs, 56);
    assert_eq!(s.df_residual, 53);
    assert_eq!(s.df_model, 2);
}

#[test]
fn recovers_coefficients_on_complete_panel() {
    // Without noise the MR adjustment absorbs a_o + b_d exactly.
    let ds = generate_panel(&PanelOptions { n_countries: 10, self_pairs: true, noise_sd: 0.0, seed: 7 });
    let s = estimate_bvu(&spec(), false, &ds).unwrap();
    assert_relative_eq!(s.coefficient("log_distance_mr").unwrap().estimate, BETA_DIST, epsilon = 1e-8);
    assert_relative_eq!(s.coefficient("rta_mr").unwrap().estimate, BETA_RTA, epsilon = 1e-8);
}

#[test]
fn recovers_coefficients_with_noise() {
    let ds =
        generate_panel(&PanelOptions { n_countries: 25, self_pairs: true, noise_sd: 0.2, seed: 42 });
    let s = estimate_bvu(&spec(), true, &ds).unwrap();
    let bd = s.coefficient("log_distance_mr").unwrap();
    let br = s.coefficient("rta_mr").unwrap();
    assert!((bd.estimate - BETA_DIST).abs() < 5.0 * bd.std_error + 0.05, "beta_dist={}", bd.estimate);
    assert!((br.estimate - BETA_RTA).abs() < 5.0 * br.std_error + 0.05, "beta_rta={}", br.estimate);
    assert!(bd.p_value < 1e-6);
    assert!(s.r_squared > 0.0 && s.r_squared <= 1.0);
    assert!(s.f_p_value < 1e-6);
}

#[test]
fn robust_and_classical_share_point_estimates() {
    let ds = generate_panel(&PanelOptions { n_countries: 12, self_pairs: false, noise_sd: 0.3, seed: 3 });
    let robust = estimate_bvu(&spec(), true, &ds).unwrap();
    let classical = estimate_bvu(&spec(), false, &ds).unwrap();
    for (r, c) in robust.coefficients.iter().zip(&classical.coefficients) {
        assert_relative_eq!(r.estimate, c.estimate, epsilon = 1e-12);
    }
    let differs = robust
        .coefficients
        .iter()
        .zip(&classical.coefficients)
        .any(|(r, c)| (r.std_error - c.std_error).abs() > 1e-10);
    assert!(differs, "HC1 and classical standard errors should differ");
    assert_eq!(robust.r_squared, classical.r_squared);
}

#[test]
fn pipeline_is_idempotent() {
    let ds = generate_panel(&PanelOptions { n_countries: 9, self_pairs: false, noise_sd: 0.2, seed: 11 });
    let a = estimate_bvu(&spec(), true, &ds).unwrap();
    let b = estimate_bvu(&spec(), true, &ds).unwrap();
    assert_eq!(a, b);
}

#[test]
fn zero_flow_is_data_error() {
    let ds = generate_panel(&PanelOptions { n_countries: 5, self_pairs: false, noise_sd: 0.1, seed: 5 });
    let mut flow = ds.numeric("flow").unwrap().values().to_vec();
    flow[3] = 0.0;
    let ds = replace_numeric(&ds, "flow", flow);
    let err = estimate_bvu(&spec(), true, &ds).unwrap_err();
    match err {
        Error::Data { column, message } => {
            assert_eq!(column, "flow");
            assert!(message.contains("row 3"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn non_positive_distance_is_data_error() {
    let ds = generate_panel(&PanelOptions { n_countries: 5, self_pairs: false, noise_sd: 0.1, seed: 6 });
    let mut dist = ds.numeric("distw").unwrap().values().to_vec();
    dist[0] = -5.0;
    let ds = replace_numeric(&ds, "distw", dist);
    let err = estimate_bvu(&spec(), true, &ds).unwrap_err();
    assert!(matches!(err, Error::Data { ref column, .. } if column == "distw"));
}

#[test]
fn missing_regressor_values_drop_rows() {
    let ds = generate_panel(&PanelOptions { n_countries: 7, self_pairs: false, noise_sd: 0.2, seed: 9 });
    let mut rta = ds.numeric("rta").unwrap().values().to_vec();
    rta[0] = f64::NAN;
    rta[10] = f64::NAN;
    let ds = replace_numeric(&ds, "rta", rta);
    let s = estimate_bvu(&spec(), true, &ds).unwrap();
    assert_eq!(s.n_obs, 42 - 2);
}

#[test]
fn unknown_and_reserved_names() {
    let ds = generate_panel(&PanelOptions { n_countries: 5, self_pairs: false, noise_sd: 0.1, seed: 2 });

    let missing = spec().with_regressors(["contig"]);
    assert!(matches!(
        estimate_bvu(&missing, true, &ds),
        Err(Error::Data { ref column, .. }) if column == "contig"
    ));

    let reserved = spec().with_regressors(["dist_log"]);
    assert!(matches!(estimate_bvu(&reserved, true, &ds), Err(Error::Configuration(_))));

    let suffixed = spec().with_regressors(["rta_mr"]);
    assert!(matches!(estimate_bvu(&suffixed, true, &ds), Err(Error::Configuration(_))));
}

#[test]
fn origin_only_regressor_is_rank_deficient() {
    // A variable that depends only on the origin is wiped out by the MR
    // adjustment on a complete panel.
    let ds = generate_panel(&PanelOptions { n_countries: 6, self_pairs: true, noise_sd: 0.1, seed: 4 });
    let origins = ds.text("iso_o").unwrap().values().to_vec();
    let landlocked: Vec<f64> =
        origins.iter().map(|c| if c == "C01" || c == "C04" { 1.0 } else { 0.0 }).collect();
    let ds = ds.with_numeric("landlocked_o", landlocked).unwrap();
    let s = spec().with_regressors(["rta", "landlocked_o"]);
    let err = estimate_bvu(&s, true, &ds).unwrap_err();
    assert!(matches!(err, Error::Computation(ref m) if m.contains("rank-deficient")), "{err}");
}

#[test]
fn two_country_panel_is_too_small() {
    let ds = generate_panel(&PanelOptions { n_countries: 2, self_pairs: false, noise_sd: 0.1, seed: 8 });
    let err = estimate_bvu(&spec(), false, &ds).unwrap_err();
    assert!(matches!(err, Error::Computation(_)));
}

#[test]
fn income_share_weighting_is_configurable() {
    let ds = generate_panel(&PanelOptions { n_countries: 10, self_pairs: false, noise_sd: 0.2, seed: 13 });
    let cfg = BvuConfig::from_json(r#"{"weighting": "income_share", "robust": false}"#).unwrap();
    let weighted = BvuEstimator::new(cfg).unwrap().fit(&spec(), &ds).unwrap();
    let simple = estimate_bvu(&spec(), false, &ds).unwrap();
    assert_eq!(weighted.formula, simple.formula);
    assert!(!weighted.robust());
    let bw = weighted.coefficient("log_distance_mr").unwrap().estimate;
    let bs = simple.coefficient("log_distance_mr").unwrap().estimate;
    assert!(bw.is_finite() && bs.is_finite());
    assert!((bw - bs).abs() > 1e-12, "weighting should change the adjustment");
    assert_eq!(
        BvuEstimator::new(BvuConfig::default().with_weighting(MrWeighting::IncomeShare))
            .unwrap()
            .config()
            .weighting,
        MrWeighting::IncomeShare
    );
}

#[test]
fn summary_survives_json() {
    let ds = generate_panel(&PanelOptions { n_countries: 6, self_pairs: false, noise_sd: 0.2, seed: 21 });
    let s = estimate_bvu(&spec(), true, &ds).unwrap();
    let back = RegressionSummary::from_json(&s.to_json().unwrap()).unwrap();
    assert_eq!(back.formula, s.formula);
    assert_eq!(back.coefficients.len(), 3);
    let printed = s.to_string();
    assert!(printed.contains("rta_mr"));
    assert!(printed.contains("HC1"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_robust_flag_never_moves_estimates(seed in 0u64..10_000, n_c in 4usize..9) {
        let ds = generate_panel(&PanelOptions { n_countries: n_c, self_pairs: false, noise_sd: 0.25, seed });
        let r = estimate_bvu(&spec(), true, &ds);
        let c = estimate_bvu(&spec(), false, &ds);
        match (r, c) {
            (Ok(r), Ok(c)) => {
                for (a, b) in r.estimates().iter().zip(c.estimates()) {
                    prop_assert!((a - b).abs() <= 1e-10 * (1.0 + b.abs()));
                }
            }
            // Small random panels can leave rta_mr collinear; both flavours must agree on that.
            (Err(Error::Computation(_)), Err(Error::Computation(_))) => {}
            (r, c) => prop_assert!(false, "mismatched outcomes: {:?} / {:?}", r.is_ok(), c.is_ok()),
        }
    }

    #[test]
    fn prop_distance_unit_change_keeps_slope(seed in 0u64..10_000, scale in 0.001f64..1000.0) {
        // ln(k·d) = ln k + ln d: a dataset-wide shift that the MR adjustment cancels.
        let ds = generate_panel(&PanelOptions { n_countries: 6, self_pairs: false, noise_sd: 0.2, seed });
        let dist: Vec<f64> = ds.numeric("distw").unwrap().values().iter().map(|d| d * scale).collect();
        let scaled = replace_numeric(&ds, "distw", dist);
        let a = estimate_bvu(&spec(), false, &ds);
        let b = estimate_bvu(&spec(), false, &scaled);
        if let (Ok(a), Ok(b)) = (a, b) {
            for (x, y) in a.estimates().iter().zip(b.estimates()) {
                prop_assert!((x - y).abs() < 1e-7 * (1.0 + y.abs()));
            }
        }
    }
}
