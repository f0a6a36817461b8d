//! Training data representation
//!
//! A [`Dataset`] is an ordered collection of named columns, each either
//! numeric or categorical. It serves two purposes during partial dependence:
//! deriving the sweep grid and acting as the background distribution that is
//! perturbed at every grid point. The engine never mutates the caller's
//! dataset; it clones a working copy per worker.

mod loader;

pub use loader::{load_csv, DataLoader, DataSaver};

use crate::error::{PdpError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric value
    Num(f64),
    /// Categorical level
    Cat(String),
}

impl Value {
    /// Numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Cat(_) => None,
        }
    }

    /// Categorical level, if this is a category
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Num(_) => None,
            Value::Cat(s) => Some(s.as_str()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{}", v),
            Value::Cat(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Cat(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Cat(s)
    }
}

/// Column storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Continuous or integer-valued feature
    Numeric(Vec<f64>),
    /// Categorical feature stored as level codes
    Categorical { levels: Vec<String>, codes: Vec<u32> },
}

/// A named column of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Create a categorical column; levels are recorded in order of first appearance
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        let mut codes = Vec::with_capacity(values.len());
        for v in values {
            let v = v.as_ref();
            let code = match levels.iter().position(|l| l == v) {
                Some(pos) => pos,
                None => {
                    levels.push(v.to_string());
                    levels.len() - 1
                }
            };
            codes.push(code as u32);
        }
        Self {
            name: name.into(),
            data: ColumnData::Categorical { levels, codes },
        }
    }

    /// Create a categorical column from explicit levels and codes
    pub fn from_codes(name: impl Into<String>, levels: Vec<String>, codes: Vec<u32>) -> Result<Self> {
        let name = name.into();
        if let Some(bad) = codes.iter().find(|&&c| c as usize >= levels.len()) {
            return Err(PdpError::DataError(format!(
                "Column '{}': level code {} out of range ({} levels)",
                name,
                bad,
                levels.len()
            )));
        }
        Ok(Self {
            name,
            data: ColumnData::Categorical { levels, codes },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.data, ColumnData::Categorical { .. })
    }

    /// Numeric values, if the column is numeric
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical { .. } => None,
        }
    }

    /// Value at a row
    pub fn get(&self, row: usize) -> Option<Value> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).map(|x| Value::Num(*x)),
            ColumnData::Categorical { levels, codes } => codes
                .get(row)
                .map(|&c| Value::Cat(levels[c as usize].clone())),
        }
    }

    /// Numeric encoding of a row: the value itself, or the level code
    pub fn get_f64(&self, row: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied(),
            ColumnData::Categorical { codes, .. } => codes.get(row).map(|&c| c as f64),
        }
    }

    /// Observed levels in first-appearance order (categorical columns only)
    pub fn levels(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Categorical { levels, .. } => Some(levels),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Distinct values present in the column.
    ///
    /// Numeric values come back sorted ascending; categorical levels keep their
    /// first-appearance order and only include levels that actually occur.
    pub fn unique_values(&self) -> Vec<Value> {
        match &self.data {
            ColumnData::Numeric(v) => {
                let mut sorted: Vec<f64> = v.iter().copied().filter(|x| !x.is_nan()).collect();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                sorted.dedup();
                sorted.into_iter().map(Value::Num).collect()
            }
            ColumnData::Categorical { levels, codes } => {
                let present: HashSet<u32> = codes.iter().copied().collect();
                levels
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| present.contains(&(*i as u32)))
                    .map(|(_, l)| Value::Cat(l.clone()))
                    .collect()
            }
        }
    }

    /// Number of distinct values
    pub fn cardinality(&self) -> usize {
        self.unique_values().len()
    }

    /// Overwrite every row with the same value.
    ///
    /// Categorical columns accept levels they have not seen before; the level
    /// is appended so explicit grids may sweep over unobserved categories.
    pub fn fill(&mut self, value: &Value) -> Result<()> {
        match (&mut self.data, value) {
            (ColumnData::Numeric(v), Value::Num(x)) => {
                v.iter_mut().for_each(|cell| *cell = *x);
                Ok(())
            }
            (ColumnData::Categorical { levels, codes }, Value::Cat(level)) => {
                let code = match levels.iter().position(|l| l == level) {
                    Some(pos) => pos,
                    None => {
                        levels.push(level.clone());
                        levels.len() - 1
                    }
                } as u32;
                codes.iter_mut().for_each(|cell| *cell = code);
                Ok(())
            }
            (ColumnData::Numeric(_), Value::Cat(level)) => Err(PdpError::invalid_feature(
                self.name.clone(),
                format!("numeric column cannot take categorical value '{}'", level),
            )),
            (ColumnData::Categorical { .. }, Value::Num(x)) => Err(PdpError::invalid_feature(
                self.name.clone(),
                format!("categorical column cannot take numeric value {}", x),
            )),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        let data = match &self.data {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Categorical { levels, codes } => ColumnData::Categorical {
                levels: levels.clone(),
                codes: rows.iter().map(|&r| codes[r]).collect(),
            },
        };
        Self {
            name: self.name.clone(),
            data,
        }
    }
}

/// Tabular training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from columns; all columns must share a length and have unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for col in &columns {
            if col.len() != n_rows {
                return Err(PdpError::ShapeError {
                    expected: format!("{} rows", n_rows),
                    actual: format!("{} rows in column '{}'", col.len(), col.name()),
                });
            }
            if !seen.insert(col.name().to_string()) {
                return Err(PdpError::DataError(format!(
                    "Duplicate column name '{}'",
                    col.name()
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Build an all-numeric dataset from a matrix and column names
    pub fn from_array(names: &[&str], x: &Array2<f64>) -> Result<Self> {
        if names.len() != x.ncols() {
            return Err(PdpError::ShapeError {
                expected: format!("{} column names", x.ncols()),
                actual: format!("{}", names.len()),
            });
        }
        let columns = names
            .iter()
            .enumerate()
            .map(|(j, name)| Column::numeric(*name, x.column(j).to_vec()))
            .collect();
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Column by name, failing with `InvalidFeature` when absent
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| PdpError::invalid_feature(name, "not present in training data"))
    }

    pub(crate) fn column_at_mut(&mut self, index: usize) -> &mut Column {
        &mut self.columns[index]
    }

    /// Numeric values of a column
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        self.require(name)?
            .as_numeric()
            .ok_or_else(|| PdpError::invalid_feature(name, "expected a numeric column"))
    }

    /// Value at (row, column name)
    pub fn value(&self, row: usize, name: &str) -> Option<Value> {
        self.column(name).and_then(|c| c.get(row))
    }

    /// New dataset holding only the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(PdpError::DataError(format!(
                "Row index {} out of bounds (n_rows={})",
                bad, self.n_rows
            )));
        }
        Ok(Self {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        })
    }

    /// Dense numeric matrix of the named columns (categoricals as level codes)
    pub fn to_array(&self, names: &[&str]) -> Result<Array2<f64>> {
        let cols: Vec<&Column> = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<_>>()?;
        let mut out = Array2::zeros((self.n_rows, cols.len()));
        for (j, col) in cols.iter().enumerate() {
            for i in 0..self.n_rows {
                out[[i, j]] = col.get_f64(i).unwrap_or(f64::NAN);
            }
        }
        Ok(out)
    }

    /// Dense numeric matrix of every column
    pub fn to_full_array(&self) -> Result<Array2<f64>> {
        let names = self.column_names();
        self.to_array(&names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::numeric("x", vec![3.0, 1.0, 2.0, 1.0]),
            Column::categorical("color", &["red", "blue", "red", "green"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_dataset_shape() {
        let ds = sample();
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(ds.n_cols(), 2);
        assert_eq!(ds.column_names(), vec!["x", "color"]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ]);
        assert!(matches!(result, Err(PdpError::ShapeError { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Dataset::new(vec![
            Column::numeric("a", vec![1.0]),
            Column::numeric("a", vec![2.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unique_values() {
        let ds = sample();
        let x = ds.column("x").unwrap().unique_values();
        assert_eq!(x, vec![Value::Num(1.0), Value::Num(2.0), Value::Num(3.0)]);
        let color = ds.column("color").unwrap().unique_values();
        assert_eq!(
            color,
            vec![Value::from("red"), Value::from("blue"), Value::from("green")]
        );
    }

    #[test]
    fn test_fill_appends_unseen_level() {
        let mut ds = sample();
        let idx = ds.column_index("color").unwrap();
        ds.column_at_mut(idx).fill(&Value::from("purple")).unwrap();
        let col = ds.column("color").unwrap();
        assert_eq!(col.levels().unwrap().len(), 4);
        assert_eq!(col.get(2), Some(Value::from("purple")));
    }

    #[test]
    fn test_fill_type_mismatch() {
        let mut ds = sample();
        let idx = ds.column_index("x").unwrap();
        assert!(ds.column_at_mut(idx).fill(&Value::from("a")).is_err());
    }

    #[test]
    fn test_select_rows_and_array() {
        let ds = sample();
        let sub = ds.select_rows(&[2, 0]).unwrap();
        assert_eq!(sub.n_rows(), 2);
        let arr = sub.to_array(&["x", "color"]).unwrap();
        assert_eq!(arr, array![[2.0, 0.0], [3.0, 0.0]]);
        assert!(ds.select_rows(&[10]).is_err());
    }

    #[test]
    fn test_from_array() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let ds = Dataset::from_array(&["a", "b"], &x).unwrap();
        assert_eq!(ds.numeric("b").unwrap(), &[2.0, 4.0]);
        assert!(ds.numeric("missing").is_err());
    }
}
