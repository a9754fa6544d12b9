//! In-memory columnar dataset for bilateral records.
//!
//! Columns are either numeric (`f64`, with `NaN` marking a missing value) or
//! text (country codes, empty string marking a missing value). Every column
//! holds exactly [`Dataset::n_rows`] entries.
//!
//! Callers resolve column names to typed handles once, up front, via
//! [`Dataset::numeric`] / [`Dataset::text`]; an unknown name or a column of
//! the wrong kind is reported immediately as [`Error::Data`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Storage for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    /// Numeric values; `NaN` is treated as missing.
    Numeric(Vec<f64>),
    /// Text values; the empty string is treated as missing.
    Text(Vec<String>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Text(_) => "text",
        }
    }
}

/// Columnar table of bilateral records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    n_rows: usize,
    names: Vec<String>,
    columns: Vec<ColumnData>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Serialized form of [`Dataset`], checked column by column on the way in.
#[derive(Deserialize)]
struct RawDataset {
    n_rows: usize,
    names: Vec<String>,
    columns: Vec<ColumnData>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = Error;

    fn try_from(raw: RawDataset) -> Result<Self> {
        if raw.names.len() != raw.columns.len() {
            return Err(Error::Configuration(format!(
                "dataset lists {} column names for {} columns",
                raw.names.len(),
                raw.columns.len()
            )));
        }
        let mut ds = Dataset { n_rows: raw.n_rows, ..Dataset::default() };
        for (name, data) in raw.names.into_iter().zip(raw.columns) {
            if data.len() != raw.n_rows {
                return Err(Error::data(
                    name,
                    format!("column has {} rows, dataset has {}", data.len(), raw.n_rows),
                ));
            }
            ds.insert(name, data)?;
        }
        Ok(ds)
    }
}

/// Borrowed handle to a numeric column.
#[derive(Debug, Clone, Copy)]
pub struct NumericColumn<'a> {
    name: &'a str,
    values: &'a [f64],
}

impl<'a> NumericColumn<'a> {
    /// Column name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Raw values (`NaN` = missing).
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Whether row `i` holds an observed (non-`NaN`) value.
    #[inline]
    pub fn is_observed(&self, i: usize) -> bool {
        !self.values[i].is_nan()
    }
}

/// Borrowed handle to a text column.
#[derive(Debug, Clone, Copy)]
pub struct TextColumn<'a> {
    name: &'a str,
    values: &'a [String],
}

impl<'a> TextColumn<'a> {
    /// Column name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Raw values (empty = missing).
    pub fn values(&self) -> &'a [String] {
        self.values
    }

    /// Whether row `i` holds a non-empty value.
    #[inline]
    pub fn is_observed(&self, i: usize) -> bool {
        !self.values[i].is_empty()
    }
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a numeric column (builder style).
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.insert(name.into(), ColumnData::Numeric(values))?;
        Ok(self)
    }

    /// Add a text column (builder style).
    pub fn with_text<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(name.into(), ColumnData::Text(values))?;
        Ok(self)
    }

    /// Insert a column. The first column fixes the row count; later columns
    /// must match it. Re-using an existing name is rejected.
    pub fn insert(&mut self, name: String, data: ColumnData) -> Result<()> {
        if self.index_of(&name).is_some() {
            return Err(Error::data(name, "column already exists"));
        }
        if self.columns.is_empty() {
            self.n_rows = data.len();
        } else if data.len() != self.n_rows {
            return Err(Error::data(
                name,
                format!("column has {} rows, dataset has {}", data.len(), self.n_rows),
            ));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(data);
        Ok(())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// `true` when the dataset holds no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Whether a column named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Resolve a numeric column by name.
    pub fn numeric(&self, name: &str) -> Result<NumericColumn<'_>> {
        let idx = self.index_of(name).ok_or_else(|| Error::data(name, "column not found"))?;
        match &self.columns[idx] {
            ColumnData::Numeric(values) => Ok(NumericColumn { name: &self.names[idx], values }),
            other => Err(Error::data(name, format!("expected numeric column, found {}", other.kind()))),
        }
    }

    /// Resolve a text column by name.
    pub fn text(&self, name: &str) -> Result<TextColumn<'_>> {
        let idx = self.index_of(name).ok_or_else(|| Error::data(name, "column not found"))?;
        match &self.columns[idx] {
            ColumnData::Text(values) => Ok(TextColumn { name: &self.names[idx], values }),
            other => Err(Error::data(name, format!("expected text column, found {}", other.kind()))),
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
