//! Built-in model families

use super::{Model, Prediction};
use crate::data::{ColumnData, Dataset};
use crate::error::{PdpError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::path::Path;

pub(crate) const LINEAR_TAG: &str = "linear";
pub(crate) const LOGISTIC_TAG: &str = "logistic";
pub(crate) const SOFTMAX_TAG: &str = "softmax";
pub(crate) const FN_TAG: &str = "fn";
pub(crate) const MATRIX_TAG: &str = "matrix";

/// Linear predictor over numeric and categorical columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Intercept term
    #[serde(default)]
    pub intercept: f64,
    /// Slope per numeric column
    #[serde(default)]
    pub coefficients: BTreeMap<String, f64>,
    /// Additive effect per level of categorical columns (missing levels contribute 0)
    #[serde(default)]
    pub level_effects: BTreeMap<String, BTreeMap<String, f64>>,
}

impl LinearModel {
    /// Create a new model with the given intercept
    pub fn new(intercept: f64) -> Self {
        Self {
            intercept,
            ..Self::default()
        }
    }

    /// Add a numeric slope
    pub fn with_coefficient(mut self, name: impl Into<String>, beta: f64) -> Self {
        self.coefficients.insert(name.into(), beta);
        self
    }

    /// Add an effect for one level of a categorical column
    pub fn with_level_effect(
        mut self,
        name: impl Into<String>,
        level: impl Into<String>,
        effect: f64,
    ) -> Self {
        self.level_effects
            .entry(name.into())
            .or_default()
            .insert(level.into(), effect);
        self
    }

    /// Linear predictor for every row
    pub fn linear_predictor(&self, rows: &Dataset) -> Result<Vec<f64>> {
        let mut eta = vec![self.intercept; rows.n_rows()];

        for (name, &beta) in &self.coefficients {
            let values = rows.numeric(name).map_err(|_| {
                PdpError::PredictionError(format!(
                    "linear model needs numeric column '{}'",
                    name
                ))
            })?;
            for (acc, &x) in eta.iter_mut().zip(values) {
                *acc += beta * x;
            }
        }

        for (name, effects) in &self.level_effects {
            let column = rows.column(name).ok_or_else(|| {
                PdpError::PredictionError(format!("linear model needs column '{}'", name))
            })?;
            match column.data() {
                ColumnData::Categorical { levels, codes } => {
                    let by_code: Vec<f64> = levels
                        .iter()
                        .map(|l| effects.get(l).copied().unwrap_or(0.0))
                        .collect();
                    for (acc, &c) in eta.iter_mut().zip(codes) {
                        *acc += by_code[c as usize];
                    }
                }
                ColumnData::Numeric(_) => {
                    return Err(PdpError::PredictionError(format!(
                        "level effects given for numeric column '{}'",
                        name
                    )))
                }
            }
        }

        Ok(eta)
    }
}

impl Model for LinearModel {
    fn type_tag(&self) -> &str {
        LINEAR_TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Binary classifier: P(positive) = sigmoid(linear predictor)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub linear: LinearModel,
}

impl LogisticModel {
    pub fn new(linear: LinearModel) -> Self {
        Self { linear }
    }

    /// Positive-class probability for every row
    pub fn predict_proba(&self, rows: &Dataset) -> Result<Vec<f64>> {
        Ok(self
            .linear
            .linear_predictor(rows)?
            .into_iter()
            .map(sigmoid)
            .collect())
    }
}

impl Model for LogisticModel {
    fn type_tag(&self) -> &str {
        LOGISTIC_TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Multi-class classifier with one linear predictor per class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub classes: Vec<String>,
    pub linear: Vec<LinearModel>,
}

impl SoftmaxModel {
    pub fn new(classes: Vec<String>, linear: Vec<LinearModel>) -> Result<Self> {
        if classes.len() < 2 || classes.len() != linear.len() {
            return Err(PdpError::ConfigError(format!(
                "softmax model needs at least 2 classes with one linear predictor each, got {} classes and {} predictors",
                classes.len(),
                linear.len()
            )));
        }
        Ok(Self { classes, linear })
    }

    /// Class probabilities, `probs[k][i]` for class `k` and row `i`
    pub fn predict_proba(&self, rows: &Dataset) -> Result<Vec<Vec<f64>>> {
        let etas = self
            .linear
            .iter()
            .map(|m| m.linear_predictor(rows))
            .collect::<Result<Vec<_>>>()?;

        let n = rows.n_rows();
        let k = etas.len();
        let mut probs = vec![vec![0.0; n]; k];
        for i in 0..n {
            let max = etas.iter().map(|e| e[i]).fold(f64::NEG_INFINITY, f64::max);
            let denom: f64 = etas.iter().map(|e| (e[i] - max).exp()).sum();
            for c in 0..k {
                probs[c][i] = (etas[c][i] - max).exp() / denom;
            }
        }
        Ok(probs)
    }
}

impl Model for SoftmaxModel {
    fn type_tag(&self) -> &str {
        SOFTMAX_TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type DatasetPredictFn = dyn Fn(&Dataset) -> Result<Prediction> + Send + Sync;

/// Model backed by a closure over the whole dataset
pub struct FnModel {
    f: Box<DatasetPredictFn>,
}

impl FnModel {
    /// Closure returning a full multi-channel prediction
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Dataset) -> Result<Prediction> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }

    /// Closure returning one value per row
    pub fn scalar<F>(f: F) -> Self
    where
        F: Fn(&Dataset) -> Result<Vec<f64>> + Send + Sync + 'static,
    {
        Self::new(move |rows| f(rows).map(Prediction::single))
    }

    pub(crate) fn call(&self, rows: &Dataset) -> Result<Prediction> {
        (self.f)(rows)
    }
}

impl Model for FnModel {
    fn type_tag(&self) -> &str {
        FN_TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type MatrixPredictFn = dyn Fn(&Array2<f64>) -> Result<Array1<f64>> + Send + Sync;

/// Model backed by a closure over a dense numeric matrix
///
/// The matrix holds the configured columns in order; categorical columns are
/// passed as level codes.
pub struct MatrixModel {
    columns: Vec<String>,
    f: Box<MatrixPredictFn>,
}

impl MatrixModel {
    pub fn new<F>(columns: Vec<String>, f: F) -> Self
    where
        F: Fn(&Array2<f64>) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        Self {
            columns,
            f: Box::new(f),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn call(&self, rows: &Dataset) -> Result<Vec<f64>> {
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let x = rows.to_array(&names)?;
        Ok((self.f)(&x)?.to_vec())
    }
}

impl Model for MatrixModel {
    fn type_tag(&self) -> &str {
        MATRIX_TAG
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Serializable description of a built-in model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    Logistic(LogisticModel),
    Softmax(SoftmaxModel),
}

impl ModelSpec {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Materialize the model handle
    pub fn into_model(self) -> Result<Box<dyn Model>> {
        Ok(match self {
            ModelSpec::Linear(m) => Box::new(m),
            ModelSpec::Logistic(m) => Box::new(m),
            ModelSpec::Softmax(m) => Box::new(SoftmaxModel::new(m.classes, m.linear)?),
        })
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
