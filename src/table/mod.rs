//! Partial dependence / ICE result tables
//!
//! [`assemble`] joins the grid with the engine's predictions into a
//! [`PdTable`], the only input contract for rendering code. Records follow
//! grid order; in ICE mode each grid row expands into one record per
//! training row, tagged with that row's identifier.

mod center;
pub mod interaction;

pub use center::center;

use crate::data::{DataSaver, Value};
use crate::engine::PredictionResult;
use crate::error::{PdpError, Result};
use crate::grid::Grid;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Column name holding ICE curve identifiers in exported tables
pub const ID_COLUMN: &str = "yhat.id";

/// Column name holding extrapolation flags in exported tables
pub const EXTRAPOLATED_COLUMN: &str = "extrapolated";

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position of the originating grid row
    pub grid_row: usize,
    /// Feature values of the grid point, in feature order
    pub features: Vec<Value>,
    /// Prediction or summary values, in value-column order
    pub values: Vec<f64>,
    /// Training row identifier (ICE only)
    pub id: Option<usize>,
    /// Grid point lies outside the training convex hull
    pub extrapolated: bool,
}

/// Final partial dependence / ICE table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdTable {
    feature_names: Vec<String>,
    value_columns: Vec<String>,
    records: Vec<Record>,
    ice: bool,
    centered: bool,
    hull_checked: bool,
}

/// Join grid rows with their predictions and optional hull flags
pub fn assemble(
    grid: &Grid,
    result: &PredictionResult,
    centered: bool,
    hull_flags: Option<&BTreeSet<usize>>,
) -> Result<PdTable> {
    if result.grid_rows() != grid.len() {
        return Err(PdpError::ShapeError {
            expected: format!("{} grid rows", grid.len()),
            actual: format!("{} prediction rows", result.grid_rows()),
        });
    }
    let flagged = |g: usize| hull_flags.map(|f| f.contains(&g)).unwrap_or(false);

    let records = match result {
        PredictionResult::Aggregate { values, .. } => grid
            .rows()
            .iter()
            .zip(values)
            .enumerate()
            .map(|(g, (row, v))| Record {
                grid_row: g,
                features: row.clone(),
                values: v.clone(),
                id: None,
                extrapolated: flagged(g),
            })
            .collect(),
        PredictionResult::Ice {
            row_ids, values, ..
        } => {
            let mut records = Vec::with_capacity(grid.len() * row_ids.len());
            for (g, (row, channels)) in grid.rows().iter().zip(values).enumerate() {
                for (r, &id) in row_ids.iter().enumerate() {
                    records.push(Record {
                        grid_row: g,
                        features: row.clone(),
                        values: channels.iter().map(|c| c[r]).collect(),
                        id: Some(id),
                        extrapolated: flagged(g),
                    });
                }
            }
            records
        }
    };

    Ok(PdTable {
        feature_names: grid.feature_names().to_vec(),
        value_columns: result.columns().to_vec(),
        records,
        ice: result.is_ice(),
        centered,
        hull_checked: hull_flags.is_some(),
    })
}

impl PdTable {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_ice(&self) -> bool {
        self.ice
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    /// Whether convex hull flags were computed
    pub fn hull_checked(&self) -> bool {
        self.hull_checked
    }

    /// Values of one value column, in record order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.value_columns.iter().position(|c| c == name)?;
        Some(self.records.iter().map(|r| r.values[idx]).collect())
    }

    /// Distinct ICE identifiers in first-appearance order
    pub fn ids(&self) -> Vec<usize> {
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter_map(|r| r.id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Records of one ICE curve, in grid order
    pub fn curve(&self, id: usize) -> Vec<&Record> {
        self.records.iter().filter(|r| r.id == Some(id)).collect()
    }

    /// Number of flagged records
    pub fn n_extrapolated(&self) -> usize {
        self.records.iter().filter(|r| r.extrapolated).count()
    }

    /// Copy without hull-flagged records
    pub fn without_extrapolated(&self) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| !r.extrapolated)
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// Average ICE curves into a partial dependence table
    pub fn average_ice(&self) -> Result<Self> {
        if !self.ice {
            return Err(PdpError::DataError(
                "table does not hold ICE curves".to_string(),
            ));
        }
        let n_cols = self.value_columns.len();
        let mut records: Vec<Record> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        // ICE records are grouped by grid row, so each new grid row starts a group
        for r in &self.records {
            match records.last_mut() {
                Some(last) if last.grid_row == r.grid_row => {
                    for (acc, v) in last.values.iter_mut().zip(&r.values) {
                        *acc += v;
                    }
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    records.push(Record {
                        grid_row: r.grid_row,
                        features: r.features.clone(),
                        values: r.values.clone(),
                        id: None,
                        extrapolated: r.extrapolated,
                    });
                    counts.push(1);
                }
            }
        }
        for (record, &n) in records.iter_mut().zip(&counts) {
            debug_assert_eq!(record.values.len(), n_cols);
            record.values.iter_mut().for_each(|v| *v /= n as f64);
        }

        Ok(Self {
            feature_names: self.feature_names.clone(),
            value_columns: self.value_columns.clone(),
            records,
            ice: false,
            centered: self.centered,
            hull_checked: self.hull_checked,
        })
    }

    /// Convert to a polars frame: feature columns, value columns, then id / flag columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut series: Vec<Series> = Vec::new();

        for (j, name) in self.feature_names.iter().enumerate() {
            let categorical = self
                .records
                .first()
                .map(|r| matches!(r.features[j], Value::Cat(_)))
                .unwrap_or(false);
            if categorical {
                let values: Vec<String> = self
                    .records
                    .iter()
                    .map(|r| r.features[j].to_string())
                    .collect();
                series.push(Series::new(name.as_str().into(), values));
            } else {
                let values: Vec<f64> = self
                    .records
                    .iter()
                    .map(|r| r.features[j].as_f64().unwrap_or(f64::NAN))
                    .collect();
                series.push(Series::new(name.as_str().into(), values));
            }
        }

        for (c, name) in self.value_columns.iter().enumerate() {
            let values: Vec<f64> = self.records.iter().map(|r| r.values[c]).collect();
            series.push(Series::new(name.as_str().into(), values));
        }

        if self.ice {
            let ids: Vec<u64> = self
                .records
                .iter()
                .map(|r| r.id.unwrap_or(0) as u64)
                .collect();
            series.push(Series::new(ID_COLUMN.into(), ids));
        }

        if self.hull_checked {
            let flags: Vec<bool> = self.records.iter().map(|r| r.extrapolated).collect();
            series.push(Series::new(EXTRAPOLATED_COLUMN.into(), flags));
        }

        Ok(DataFrame::new(series)?)
    }

    /// Write as CSV
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        DataSaver::save_csv(&mut df, path)
    }

    /// Write as a JSON array of records
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        DataSaver::save_json(&mut df, path)
    }

    /// Write in the format implied by the file extension (`.json`, otherwise CSV)
    pub fn write_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            self.write_json(path)
        } else {
            self.write_csv(path)
        }
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub(crate) fn set_centered(&mut self, centered: bool) {
        self.centered = centered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::FeatureGrid;

    fn grid() -> Grid {
        Grid::cartesian(vec![FeatureGrid {
            name: "x".to_string(),
            values: vec![Value::Num(0.0), Value::Num(1.0)],
        }])
    }

    fn ice_result() -> PredictionResult {
        PredictionResult::Ice {
            columns: vec!["yhat".to_string()],
            row_ids: vec![1, 2, 3],
            values: vec![vec![vec![1.0, 2.0, 3.0]], vec![vec![2.0, 4.0, 6.0]]],
        }
    }

    #[test]
    fn test_assemble_aggregate() {
        let result = PredictionResult::Aggregate {
            columns: vec!["yhat".to_string()],
            values: vec![vec![1.5], vec![2.5]],
        };
        let table = assemble(&grid(), &result, false, None).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("yhat").unwrap(), vec![1.5, 2.5]);
        assert!(!table.is_ice());
        assert!(table.ids().is_empty());
    }

    #[test]
    fn test_assemble_ice_grid_major() {
        let table = assemble(&grid(), &ice_result(), false, None).unwrap();
        assert_eq!(table.len(), 6);
        let ids: Vec<Option<usize>> = table.records().iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![Some(1), Some(2), Some(3), Some(1), Some(2), Some(3)]
        );
        assert_eq!(table.curve(2).len(), 2);
        assert_eq!(table.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_assemble_shape_mismatch() {
        let result = PredictionResult::Aggregate {
            columns: vec!["yhat".to_string()],
            values: vec![vec![1.5]],
        };
        assert!(assemble(&grid(), &result, false, None).is_err());
    }

    #[test]
    fn test_average_ice() {
        let table = assemble(&grid(), &ice_result(), false, None).unwrap();
        let pd = table.average_ice().unwrap();
        assert_eq!(pd.column("yhat").unwrap(), vec![2.0, 4.0]);
        assert!(pd.average_ice().is_err());
    }

    #[test]
    fn test_hull_flags_and_filter() {
        let flags: BTreeSet<usize> = [1].into_iter().collect();
        let result = PredictionResult::Aggregate {
            columns: vec!["yhat".to_string()],
            values: vec![vec![1.0], vec![2.0]],
        };
        let table = assemble(&grid(), &result, false, Some(&flags)).unwrap();
        assert_eq!(table.n_extrapolated(), 1);
        let kept = table.without_extrapolated();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.records()[0].grid_row, 0);
    }

    #[test]
    fn test_to_dataframe_columns() {
        let table = assemble(&grid(), &ice_result(), false, None).unwrap();
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 6);
        assert_eq!(df.width(), 3);
        assert!(df.column(ID_COLUMN).is_ok());
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pd.csv");
        let table = assemble(&grid(), &ice_result(), false, None).unwrap();
        table.write_auto(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x,yhat,yhat.id"));
    }
}
