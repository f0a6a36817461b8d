//! Grid construction
//!
//! Builds the sweep values for each requested feature and expands multiple
//! features into their full Cartesian product. Row order of a multi-feature
//! grid is row-major with the first listed feature varying slowest; plotting
//! code depends on that ordering.

pub mod quantile;

use crate::data::{Column, Dataset, Value};
use crate::error::{PdpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Maximum number of features in a single partial dependence request
pub const MAX_FEATURES: usize = 3;

/// Default number of grid points per continuous feature
pub const DEFAULT_RESOLUTION: usize = 51;

/// How sweep values for continuous features are chosen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMethod {
    /// `resolution` sample quantiles at evenly spaced probabilities from 0 to 1
    #[default]
    Quantile,
    /// `resolution` evenly spaced values between the observed min and max
    Uniform,
    /// Sample quantiles at the given probabilities
    Probs(Vec<f64>),
}

/// Grid construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Points per continuous feature
    pub resolution: usize,
    /// Continuous-feature sweep method
    pub method: GridMethod,
    /// Drop Tukey-fence outliers before computing the sweep range
    pub trim_outliers: bool,
    /// Numeric features with at most this many distinct values use every value (0 disables)
    pub categorical_threshold: usize,
    /// Numeric columns that are always swept over their observed values
    pub categorical: Vec<String>,
    /// Explicit cut points per feature, overriding the sweep method
    pub cut_points: BTreeMap<String, Vec<f64>>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            method: GridMethod::Quantile,
            trim_outliers: false,
            categorical_threshold: 0,
            categorical: Vec::new(),
            cut_points: BTreeMap::new(),
        }
    }
}

impl GridConfig {
    /// Create a new grid configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set grid resolution
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set sweep method
    pub fn with_method(mut self, method: GridMethod) -> Self {
        self.method = method;
        self
    }

    /// Enable outlier trimming
    pub fn with_trim_outliers(mut self, trim: bool) -> Self {
        self.trim_outliers = trim;
        self
    }

    /// Set categorical cardinality threshold
    pub fn with_categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    /// Mark a numeric column as categorical
    pub fn with_categorical(mut self, name: impl Into<String>) -> Self {
        self.categorical.push(name.into());
        self
    }

    /// Use explicit cut points for a feature
    pub fn with_cut_points(mut self, name: impl Into<String>, points: Vec<f64>) -> Self {
        self.cut_points.insert(name.into(), points);
        self
    }
}

/// Sweep values for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGrid {
    pub name: String,
    pub values: Vec<Value>,
}

impl FeatureGrid {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric sweep values (empty for categorical features)
    pub fn numeric_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }
}

/// Full grid: one row per combination of feature values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    feature_names: Vec<String>,
    axes: Vec<FeatureGrid>,
    rows: Vec<Vec<Value>>,
}

impl Grid {
    /// Cartesian product of per-feature grids, first axis varying slowest
    pub fn cartesian(axes: Vec<FeatureGrid>) -> Self {
        let feature_names = axes.iter().map(|a| a.name.clone()).collect();
        let mut rows: Vec<Vec<Value>> = vec![Vec::new()];
        for axis in &axes {
            let mut next = Vec::with_capacity(rows.len() * axis.len());
            for prefix in &rows {
                for value in &axis.values {
                    let mut row = prefix.clone();
                    row.push(value.clone());
                    next.push(row);
                }
            }
            rows = next;
        }
        if axes.is_empty() {
            rows.clear();
        }
        Self {
            feature_names,
            axes,
            rows,
        }
    }

    /// Grid from caller-supplied rows
    pub fn from_rows(feature_names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        check_feature_names(&feature_names)?;
        if rows.is_empty() {
            return Err(PdpError::invalid_grid(
                feature_names.join(", "),
                "explicit grid has no rows",
            ));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != feature_names.len())
        {
            return Err(PdpError::invalid_grid(
                feature_names.join(", "),
                format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    feature_names.len()
                ),
            ));
        }

        let axes = feature_names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let mut values: Vec<Value> = Vec::new();
                for row in &rows {
                    if !values.contains(&row[j]) {
                        values.push(row[j].clone());
                    }
                }
                FeatureGrid {
                    name: name.clone(),
                    values,
                }
            })
            .collect();

        Ok(Self {
            feature_names,
            axes,
            rows,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Per-feature sweep values
    pub fn axes(&self) -> &[FeatureGrid] {
        &self.axes
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&[Value]> {
        self.rows.get(i).map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Human-readable `name=value` rendering of a grid row
    pub fn describe_row(&self, i: usize) -> String {
        match self.rows.get(i) {
            Some(row) => self
                .feature_names
                .iter()
                .zip(row)
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join(", "),
            None => format!("<row {} out of range>", i),
        }
    }

    /// Check that every feature exists in `data` with a compatible column type
    pub fn validate_against(&self, data: &Dataset) -> Result<()> {
        check_features_present(&self.feature_names, data)?;
        for (j, name) in self.feature_names.iter().enumerate() {
            let categorical = data.require(name)?.is_categorical();
            let mismatch = self.rows.iter().any(|row| match &row[j] {
                Value::Num(_) => categorical,
                Value::Cat(_) => !categorical,
            });
            if mismatch {
                return Err(PdpError::invalid_grid(
                    name.clone(),
                    "grid value type does not match the training column type",
                ));
            }
        }
        Ok(())
    }
}

/// Build the grid for `feature_names` from the training data
pub fn build_grid<S: AsRef<str>>(
    feature_names: &[S],
    training: &Dataset,
    config: &GridConfig,
) -> Result<Grid> {
    let names: Vec<String> = feature_names.iter().map(|s| s.as_ref().to_string()).collect();
    check_feature_names(&names)?;
    check_features_present(&names, training)?;

    let axes = names
        .iter()
        .map(|name| {
            let column = training.require(name)?;
            build_feature_grid(column, config)
        })
        .collect::<Result<Vec<_>>>()?;

    let grid = Grid::cartesian(axes);
    debug!(
        features = ?names,
        axis_sizes = ?grid.axes().iter().map(FeatureGrid::len).collect::<Vec<_>>(),
        grid_rows = grid.len(),
        "Built grid"
    );
    Ok(grid)
}

/// Sweep values for a single column
pub fn build_feature_grid(column: &Column, config: &GridConfig) -> Result<FeatureGrid> {
    let name = column.name().to_string();

    if let Some(points) = config.cut_points.get(&name) {
        if points.len() < 2 {
            return Err(PdpError::invalid_grid(
                name,
                format!("explicit cut points need at least 2 values, got {}", points.len()),
            ));
        }
        if column.is_categorical() {
            return Err(PdpError::invalid_grid(
                name,
                "numeric cut points given for a categorical feature",
            ));
        }
        let mut values = quantile::sorted_finite(points);
        quantile::dedup_sorted(&mut values);
        if values.len() < 2 {
            return Err(PdpError::invalid_grid(
                name,
                "explicit cut points collapse to fewer than 2 distinct values",
            ));
        }
        return Ok(FeatureGrid {
            name,
            values: values.into_iter().map(Value::Num).collect(),
        });
    }

    if config.resolution <= 1 {
        return Err(PdpError::invalid_grid(
            name,
            format!("resolution must be greater than 1, got {}", config.resolution),
        ));
    }

    let observed = match column.as_numeric() {
        None => {
            return nonempty(name, column.unique_values());
        }
        Some(values) => values,
    };

    let forced = config.categorical.iter().any(|c| c == &name);
    if forced
        || (config.categorical_threshold > 0
            && column.cardinality() <= config.categorical_threshold)
    {
        return nonempty(name, column.unique_values());
    }

    let mut sorted = quantile::sorted_finite(observed);
    if sorted.is_empty() {
        return Err(PdpError::invalid_grid(name, "no observed values"));
    }
    if config.trim_outliers {
        sorted = quantile::trim_outliers(&sorted);
    }

    let mut values = match &config.method {
        GridMethod::Quantile => {
            quantile::quantiles_sorted(&sorted, &quantile::even_probs(config.resolution))
        }
        GridMethod::Uniform => {
            let min = sorted[0];
            let max = sorted[sorted.len() - 1];
            quantile::linspace(min, max, config.resolution)
        }
        GridMethod::Probs(probs) => {
            if probs.is_empty() || probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(PdpError::invalid_grid(
                    name,
                    "quantile probabilities must be non-empty and within [0, 1]",
                ));
            }
            let mut probs = quantile::sorted_finite(probs);
            quantile::dedup_sorted(&mut probs);
            quantile::quantiles_sorted(&sorted, &probs)
        }
    };
    quantile::dedup_sorted(&mut values);

    Ok(FeatureGrid {
        name,
        values: values.into_iter().map(Value::Num).collect(),
    })
}

fn nonempty(name: String, values: Vec<Value>) -> Result<FeatureGrid> {
    if values.is_empty() {
        return Err(PdpError::invalid_grid(name, "no observed values"));
    }
    Ok(FeatureGrid { name, values })
}

/// 1..=3 names, no duplicates
pub(crate) fn check_feature_names(names: &[String]) -> Result<()> {
    if names.is_empty() || names.len() > MAX_FEATURES {
        return Err(PdpError::InvalidFeature {
            features: names.to_vec(),
            reason: format!(
                "between 1 and {} features are required, got {}",
                MAX_FEATURES,
                names.len()
            ),
        });
    }
    let mut seen = HashSet::new();
    let dups: Vec<String> = names
        .iter()
        .filter(|n| !seen.insert(n.as_str()))
        .cloned()
        .collect();
    if !dups.is_empty() {
        return Err(PdpError::InvalidFeature {
            features: dups,
            reason: "feature listed more than once".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_features_present(names: &[String], data: &Dataset) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|n| data.column(n).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PdpError::InvalidFeature {
            features: missing,
            reason: "not present in training data".to_string(),
        });
    }
    Ok(())
}
