//! Multilateral-resistance aggregation.
//!
//! For every variable `V` that needs the MR adjustment this module builds
//! three tables:
//!
//! - an origin table: for each country `c`, the mean of `V` over records with
//!   origin `c`;
//! - a destination table: for each country `c`, the mean of `V` over records
//!   with destination `c`;
//! - the global mean of `V` over all records.
//!
//! Under [`MrWeighting::IncomeShare`] the arithmetic means are replaced by
//! partner sums weighted with world-income shares `θ`:
//! origin term `Σ_k θ_k V_ik`, destination term `Σ_k θ_k V_kj`, global term
//! `Σ θ_i θ_j V_ij`.
//!
//! Countries are interned once into a [`CountryIndex`]; each table is a
//! pre-sized array keyed by country id in which a country absent from that
//! role has no entry. A lookup for such a country is an error, never a zero.
//! Tables keep the interned codes they were built with, so terms applied
//! through a differently numbered index are resolved by code.
//!
//! # References
//!
//! - Baier & Bergstrand (2009), "Bonus vetus OLS: A simple method for
//!   approximating international trade-cost effects using the gravity
//!   equation." *Journal of International Economics* 77(1).

use std::collections::HashMap;
use std::sync::Arc;

use gravity_core::{Error, Result};
use rayon::prelude::*;

use crate::config::MrWeighting;

/// Country codes interned in first-seen order.
#[derive(Debug, Default, PartialEq)]
struct Countries {
    codes: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl Countries {
    fn intern(&mut self, code: &str) -> usize {
        if let Some(&id) = self.lookup.get(code) {
            return id;
        }
        let id = self.codes.len();
        self.codes.push(code.to_string());
        self.lookup.insert(code.to_string(), id);
        id
    }

    fn id(&self, code: &str) -> Option<usize> {
        self.lookup.get(code).copied()
    }
}

fn same_countries(a: &Arc<Countries>, b: &Arc<Countries>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

/// Interned country codes and the per-row origin/destination ids.
#[derive(Debug, Clone)]
pub struct CountryIndex {
    countries: Arc<Countries>,
    origin_of: Vec<usize>,
    destination_of: Vec<usize>,
    is_origin: Vec<bool>,
    is_destination: Vec<bool>,
}

impl CountryIndex {
    /// Intern the codes of `origins[i] -> destinations[i]` records.
    pub fn build(origins: &[String], destinations: &[String]) -> Result<Self> {
        if origins.len() != destinations.len() {
            return Err(Error::Computation(format!(
                "origin codes ({}) and destination codes ({}) differ in length",
                origins.len(),
                destinations.len()
            )));
        }
        let n = origins.len();
        let mut countries = Countries::default();
        let mut origin_of = Vec::with_capacity(n);
        let mut destination_of = Vec::with_capacity(n);
        for (o, d) in origins.iter().zip(destinations) {
            origin_of.push(countries.intern(o));
            destination_of.push(countries.intern(d));
        }

        let n_c = countries.codes.len();
        let mut is_origin = vec![false; n_c];
        let mut is_destination = vec![false; n_c];
        for &o in &origin_of {
            is_origin[o] = true;
        }
        for &d in &destination_of {
            is_destination[d] = true;
        }

        Ok(Self { countries: Arc::new(countries), origin_of, destination_of, is_origin, is_destination })
    }

    /// Number of records indexed.
    pub fn n_records(&self) -> usize {
        self.origin_of.len()
    }

    /// Number of distinct countries in either role.
    pub fn n_countries(&self) -> usize {
        self.countries.codes.len()
    }

    /// Number of distinct origin countries.
    pub fn n_origins(&self) -> usize {
        self.is_origin.iter().filter(|&&b| b).count()
    }

    /// Number of distinct destination countries.
    pub fn n_destinations(&self) -> usize {
        self.is_destination.iter().filter(|&&b| b).count()
    }

    /// Country id for `code`.
    pub fn id(&self, code: &str) -> Option<usize> {
        self.countries.id(code)
    }

    /// Country code for `id`.
    pub fn code(&self, id: usize) -> &str {
        &self.countries.codes[id]
    }

    /// Origin country id of record `i`.
    #[inline]
    pub fn origin_of(&self, i: usize) -> usize {
        self.origin_of[i]
    }

    /// Destination country id of record `i`.
    #[inline]
    pub fn destination_of(&self, i: usize) -> usize {
        self.destination_of[i]
    }

    /// Countries that appear as origin but never as destination.
    pub fn origin_only(&self) -> Vec<&str> {
        (0..self.n_countries())
            .filter(|&c| self.is_origin[c] && !self.is_destination[c])
            .map(|c| self.code(c))
            .collect()
    }

    /// Countries that appear as destination but never as origin.
    pub fn destination_only(&self) -> Vec<&str> {
        (0..self.n_countries())
            .filter(|&c| self.is_destination[c] && !self.is_origin[c])
            .map(|c| self.code(c))
            .collect()
    }
}

/// Which side of a bilateral record a country stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Exporter / sender.
    Origin,
    /// Importer / receiver.
    Destination,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Origin => "origin",
            Role::Destination => "destination",
        }
    }
}

/// Per-country values for one role, keyed by country id.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanTable {
    values: Vec<Option<f64>>,
}

impl MeanTable {
    /// Value for country `id`, or `None` if it never appeared in this role.
    pub fn get(&self, id: usize) -> Option<f64> {
        self.values.get(id).copied().flatten()
    }

    /// Number of countries with an entry.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// `true` when no country has an entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resistance tables of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResistanceTerms {
    variable: String,
    countries: Arc<Countries>,
    origin: MeanTable,
    destination: MeanTable,
    global: f64,
}

impl ResistanceTerms {
    /// Variable these terms belong to.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Origin-side table.
    pub fn origin_table(&self) -> &MeanTable {
        &self.origin
    }

    /// Destination-side table.
    pub fn destination_table(&self) -> &MeanTable {
        &self.destination
    }

    /// Global term.
    pub fn global(&self) -> f64 {
        self.global
    }

    /// Term for country `id` of `index` in `role`; missing entries fail loudly.
    ///
    /// `index` may number countries differently from the index the terms were
    /// built on; the lookup then goes through the country code.
    pub fn term(&self, role: Role, id: usize, index: &CountryIndex) -> Result<f64> {
        let code = index.code(id);
        if Arc::ptr_eq(&self.countries, &index.countries) {
            return self.lookup(role, Some(id), code);
        }
        self.lookup(role, self.countries.id(code), code)
    }

    /// Term for country `code` in `role`.
    pub fn term_for_code(&self, role: Role, code: &str) -> Result<f64> {
        self.lookup(role, self.countries.id(code), code)
    }

    fn lookup(&self, role: Role, own_id: Option<usize>, code: &str) -> Result<f64> {
        let table = match role {
            Role::Origin => &self.origin,
            Role::Destination => &self.destination,
        };
        own_id.and_then(|k| table.get(k)).ok_or_else(|| {
            Error::data(
                &self.variable,
                format!(
                    "no {} mean for country `{code}`: it never appears as {} in the sample",
                    role.as_str(),
                    role.as_str()
                ),
            )
        })
    }

    /// Combined correction `origin + destination - global` for record `i`.
    #[inline]
    pub fn correction(&self, i: usize, index: &CountryIndex) -> Result<f64> {
        let o = self.term(Role::Origin, index.origin_of(i), index)?;
        let d = self.term(Role::Destination, index.destination_of(i), index)?;
        Ok(o + d - self.global)
    }
}

/// Arithmetic-mean resistance terms of one variable.
pub fn simple_means(index: &CountryIndex, variable: &str, values: &[f64]) -> Result<ResistanceTerms> {
    check_len(index, variable, values)?;
    let n_c = index.n_countries();

    let mut origin_sum = vec![0.0_f64; n_c];
    let mut origin_cnt = vec![0usize; n_c];
    let mut dest_sum = vec![0.0_f64; n_c];
    let mut dest_cnt = vec![0usize; n_c];
    let mut total = 0.0_f64;

    for (i, &v) in values.iter().enumerate() {
        let o = index.origin_of(i);
        let d = index.destination_of(i);
        origin_sum[o] += v;
        origin_cnt[o] += 1;
        dest_sum[d] += v;
        dest_cnt[d] += 1;
        total += v;
    }

    let mean = |sums: Vec<f64>, counts: Vec<usize>| MeanTable {
        values: sums
            .into_iter()
            .zip(counts)
            .map(|(s, c)| if c > 0 { Some(s / c as f64) } else { None })
            .collect(),
    };

    Ok(ResistanceTerms {
        variable: variable.to_string(),
        countries: Arc::clone(&index.countries),
        origin: mean(origin_sum, origin_cnt),
        destination: mean(dest_sum, dest_cnt),
        global: total / values.len() as f64,
    })
}

/// World-income shares `θ_c` of every indexed country.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeShares {
    countries: Arc<Countries>,
    shares: Vec<f64>,
}

impl IncomeShares {
    /// Derive shares from per-record incomes.
    ///
    /// A country's income is the mean of the origin incomes recorded for it;
    /// countries that are never an origin use their destination incomes.
    pub fn from_records(
        index: &CountryIndex,
        origin_income: &[f64],
        destination_income: &[f64],
    ) -> Result<Self> {
        check_len(index, "origin income", origin_income)?;
        check_len(index, "destination income", destination_income)?;
        let n_c = index.n_countries();
        let mut o_sum = vec![0.0_f64; n_c];
        let mut o_cnt = vec![0usize; n_c];
        let mut d_sum = vec![0.0_f64; n_c];
        let mut d_cnt = vec![0usize; n_c];
        for i in 0..index.n_records() {
            let o = index.origin_of(i);
            let d = index.destination_of(i);
            o_sum[o] += origin_income[i];
            o_cnt[o] += 1;
            d_sum[d] += destination_income[i];
            d_cnt[d] += 1;
        }

        let income: Vec<f64> = (0..n_c)
            .map(|c| if o_cnt[c] > 0 { o_sum[c] / o_cnt[c] as f64 } else { d_sum[c] / d_cnt[c] as f64 })
            .collect();
        let world: f64 = income.iter().sum();
        if !(world.is_finite() && world > 0.0) {
            return Err(Error::Computation(format!("world income must be finite and positive, got {world}")));
        }
        Ok(Self {
            countries: Arc::clone(&index.countries),
            shares: income.into_iter().map(|y| y / world).collect(),
        })
    }

    /// Share of country `id`.
    pub fn share(&self, id: usize) -> f64 {
        self.shares[id]
    }
}

/// Income-share-weighted resistance terms of one variable.
pub fn income_share_terms(
    index: &CountryIndex,
    shares: &IncomeShares,
    variable: &str,
    values: &[f64],
) -> Result<ResistanceTerms> {
    check_len(index, variable, values)?;
    if !same_countries(&shares.countries, &index.countries) {
        return Err(Error::Computation(
            "income shares were derived from a different country index".into(),
        ));
    }
    let n_c = index.n_countries();
    let mut origin: Vec<Option<f64>> = vec![None; n_c];
    let mut destination: Vec<Option<f64>> = vec![None; n_c];
    let mut global = 0.0_f64;

    for (i, &v) in values.iter().enumerate() {
        let o = index.origin_of(i);
        let d = index.destination_of(i);
        let (theta_o, theta_d) = (shares.share(o), shares.share(d));
        *origin[o].get_or_insert(0.0) += theta_d * v;
        *destination[d].get_or_insert(0.0) += theta_o * v;
        global += theta_o * theta_d * v;
    }

    Ok(ResistanceTerms {
        variable: variable.to_string(),
        countries: Arc::clone(&index.countries),
        origin: MeanTable { values: origin },
        destination: MeanTable { values: destination },
        global,
    })
}

/// Resistance terms for a set of variables.
#[derive(Debug, Clone)]
pub struct MultilateralResistance {
    terms: Vec<ResistanceTerms>,
}

impl MultilateralResistance {
    /// Aggregate every `(name, values)` pair. Variables are independent and
    /// are processed in parallel; output order follows input order.
    pub fn compute(
        index: &CountryIndex,
        variables: &[(&str, &[f64])],
        weighting: MrWeighting,
        shares: Option<&IncomeShares>,
    ) -> Result<Self> {
        let terms = match weighting {
            MrWeighting::Simple => variables
                .par_iter()
                .map(|&(name, values)| simple_means(index, name, values))
                .collect::<Result<Vec<_>>>()?,
            MrWeighting::IncomeShare => {
                let shares = shares.ok_or_else(|| {
                    Error::Configuration("income-share weighting requires income shares".into())
                })?;
                variables
                    .par_iter()
                    .map(|&(name, values)| income_share_terms(index, shares, name, values))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        Ok(Self { terms })
    }

    /// Terms in input order.
    pub fn terms(&self) -> &[ResistanceTerms] {
        &self.terms
    }

    /// Terms for `variable`.
    pub fn get(&self, variable: &str) -> Option<&ResistanceTerms> {
        self.terms.iter().find(|t| t.variable == variable)
    }
}

fn check_len(index: &CountryIndex, variable: &str, values: &[f64]) -> Result<()> {
    if values.len() != index.n_records() {
        return Err(Error::data(
            variable,
            format!("has {} values, expected {}", values.len(), index.n_records()),
        ));
    }
    if values.is_empty() {
        return Err(Error::data(variable, "no records to aggregate"));
    }
    Ok(())
}
