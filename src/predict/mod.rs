//! Prediction adapters
//!
//! The engine treats a fitted model as an opaque handle and obtains
//! predictions through a [`PredictionAdapter`]. Adapters are looked up by the
//! model's type tag in an [`AdapterRegistry`], so new model families plug in
//! by registering an adapter rather than by changing the engine.

mod adapters;
mod models;

pub use adapters::{
    ClassScale, FnModelAdapter, LinearAdapter, LogisticAdapter, MatrixModelAdapter, SoftmaxAdapter,
};
pub use models::{FnModel, LinearModel, LogisticModel, MatrixModel, ModelSpec, SoftmaxModel};
pub(crate) use models::{sigmoid, SOFTMAX_TAG};

use crate::data::Dataset;
use crate::error::{PdpError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Channel name used for single-output predictions
pub const DEFAULT_CHANNEL: &str = "yhat";

/// A fitted model handle
pub trait Model: Any + Send + Sync {
    /// Registry key identifying the model family
    fn type_tag(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Extracts predictions from a model for a batch of rows
pub trait PredictionAdapter: Send + Sync {
    /// One value per row for every output channel
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction>;
}

/// Per-row model output, one or more named channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    channels: Vec<String>,
    /// `values[c][i]` is channel `c` for row `i`
    values: Vec<Vec<f64>>,
}

impl Prediction {
    /// Single-channel prediction named `yhat`
    pub fn single(values: Vec<f64>) -> Self {
        Self {
            channels: vec![DEFAULT_CHANNEL.to_string()],
            values: vec![values],
        }
    }

    /// Multi-channel prediction; all channels must have the same length
    pub fn multi(channels: Vec<(String, Vec<f64>)>) -> Result<Self> {
        if channels.is_empty() {
            return Err(PdpError::PredictionError(
                "prediction has no output channels".to_string(),
            ));
        }
        let n = channels[0].1.len();
        if let Some((name, v)) = channels.iter().find(|(_, v)| v.len() != n) {
            return Err(PdpError::ShapeError {
                expected: format!("{} values per channel", n),
                actual: format!("{} values in channel '{}'", v.len(), name),
            });
        }
        let (names, values) = channels.into_iter().unzip();
        Ok(Self {
            channels: names,
            values,
        })
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channels
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn n_rows(&self) -> usize {
        self.values.first().map(Vec::len).unwrap_or(0)
    }

    /// Values of channel `c`
    pub fn channel(&self, c: usize) -> &[f64] {
        &self.values[c]
    }

    /// Iterate `(name, values)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Apply a function to every value
    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for channel in &mut self.values {
            channel.iter_mut().for_each(|v| *v = f(*v));
        }
        self
    }
}

/// Lookup table from model type tag to adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PredictionAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with adapters for every built-in model family
    pub fn with_defaults() -> Self {
        Self::with_class_scale(ClassScale::default())
    }

    /// Built-in adapters with the given output scale for classifiers
    pub fn with_class_scale(scale: ClassScale) -> Self {
        let mut registry = Self::new();
        registry.register(models::LINEAR_TAG, LinearAdapter);
        registry.register(models::LOGISTIC_TAG, LogisticAdapter::new(scale));
        registry.register(models::SOFTMAX_TAG, SoftmaxAdapter::new(scale));
        registry.register(models::FN_TAG, FnModelAdapter);
        registry.register(models::MATRIX_TAG, MatrixModelAdapter);
        registry
    }

    /// Register or replace the adapter for a tag
    pub fn register(&mut self, tag: impl Into<String>, adapter: impl PredictionAdapter + 'static) {
        self.adapters.insert(tag.into(), Arc::new(adapter));
    }

    /// Register a shared adapter
    pub fn register_arc(&mut self, tag: impl Into<String>, adapter: Arc<dyn PredictionAdapter>) {
        self.adapters.insert(tag.into(), adapter);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn PredictionAdapter>> {
        self.adapters.get(tag).cloned()
    }

    /// Adapter for a model, failing with `UnknownModelType`
    pub fn resolve(&self, model: &dyn Model) -> Result<Arc<dyn PredictionAdapter>> {
        self.get(model.type_tag())
            .ok_or_else(|| PdpError::UnknownModelType(model.type_tag().to_string()))
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Downcast a model handle to a concrete type
pub(crate) fn downcast<'a, T: Model>(model: &'a dyn Model, expected: &str) -> Result<&'a T> {
    model.as_any().downcast_ref::<T>().ok_or_else(|| {
        PdpError::PredictionError(format!(
            "adapter for '{}' received a model tagged '{}'",
            expected,
            model.type_tag()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    struct Constant(f64);

    impl Model for Constant {
        fn type_tag(&self) -> &str {
            "constant"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct ConstantAdapter;

    impl PredictionAdapter for ConstantAdapter {
        fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
            let m = downcast::<Constant>(model, "constant")?;
            Ok(Prediction::single(vec![m.0; rows.n_rows()]))
        }
    }

    #[test]
    fn test_unknown_model_type() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.resolve(&Constant(1.0)).err().unwrap();
        assert!(matches!(err, PdpError::UnknownModelType(tag) if tag == "constant"));
    }

    #[test]
    fn test_custom_adapter_registration() {
        let mut registry = AdapterRegistry::with_defaults();
        registry.register("constant", ConstantAdapter);
        let ds = Dataset::new(vec![Column::numeric("x", vec![1.0, 2.0])]).unwrap();
        let model = Constant(4.0);
        let pred = registry.resolve(&model).unwrap().predict(&model, &ds).unwrap();
        assert_eq!(pred.channel(0), &[4.0, 4.0]);
        assert!(registry.tags().contains(&"linear"));
    }

    #[test]
    fn test_multi_prediction_shape_check() {
        let bad = Prediction::multi(vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![1.0]),
        ]);
        assert!(bad.is_err());

        let ok = Prediction::multi(vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![3.0, 4.0]),
        ])
        .unwrap();
        assert_eq!(ok.n_channels(), 2);
        assert_eq!(ok.n_rows(), 2);
        assert_eq!(ok.channel_names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_map_values() {
        let p = Prediction::single(vec![0.0, 1.0]).map_values(|v| v + 1.0);
        assert_eq!(p.channel(0), &[1.0, 2.0]);
    }
}
