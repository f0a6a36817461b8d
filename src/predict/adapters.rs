//! Adapters for the built-in model families

use super::models::{
    FnModel, LinearModel, LogisticModel, MatrixModel, SoftmaxModel, FN_TAG, LINEAR_TAG,
    LOGISTIC_TAG, MATRIX_TAG, SOFTMAX_TAG,
};
use super::{downcast, Model, Prediction, PredictionAdapter};
use crate::data::Dataset;
use crate::error::{PdpError, Result};
use serde::{Deserialize, Serialize};

/// Probabilities are clamped away from 0 and 1 before taking logs
const PROB_EPS: f64 = 1e-12;

/// Output scale for classifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassScale {
    /// Class probability
    Probability,
    /// Log probability minus the mean log probability across classes
    #[default]
    CenteredLogit,
}

/// Adapter for [`LinearModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAdapter;

impl PredictionAdapter for LinearAdapter {
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
        let m = downcast::<LinearModel>(model, LINEAR_TAG)?;
        Ok(Prediction::single(m.linear_predictor(rows)?))
    }
}

/// Adapter for [`LogisticModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticAdapter {
    scale: ClassScale,
}

impl LogisticAdapter {
    pub fn new(scale: ClassScale) -> Self {
        Self { scale }
    }
}

impl PredictionAdapter for LogisticAdapter {
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
        let m = downcast::<LogisticModel>(model, LOGISTIC_TAG)?;
        let p = m.predict_proba(rows)?;
        let values = match self.scale {
            ClassScale::Probability => p,
            ClassScale::CenteredLogit => p
                .into_iter()
                .map(|p| {
                    let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
                    0.5 * (p.ln() - (1.0 - p).ln())
                })
                .collect(),
        };
        Ok(Prediction::single(values))
    }
}

/// Adapter for [`SoftmaxModel`]
///
/// With a focal class the output is a single `yhat` channel; otherwise each
/// class becomes its own channel.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxAdapter {
    scale: ClassScale,
    which_class: Option<String>,
}

impl SoftmaxAdapter {
    pub fn new(scale: ClassScale) -> Self {
        Self {
            scale,
            which_class: None,
        }
    }

    /// Restrict output to one class
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.which_class = Some(class.into());
        self
    }
}

impl PredictionAdapter for SoftmaxAdapter {
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
        let m = downcast::<SoftmaxModel>(model, SOFTMAX_TAG)?;
        let mut probs = m.predict_proba(rows)?;

        if self.scale == ClassScale::CenteredLogit {
            let k = probs.len() as f64;
            for i in 0..rows.n_rows() {
                let logs: Vec<f64> = probs
                    .iter()
                    .map(|p| p[i].clamp(PROB_EPS, 1.0).ln())
                    .collect();
                let mean = logs.iter().sum::<f64>() / k;
                for (p, l) in probs.iter_mut().zip(&logs) {
                    p[i] = l - mean;
                }
            }
        }

        match &self.which_class {
            Some(class) => {
                let idx = m.classes.iter().position(|c| c == class).ok_or_else(|| {
                    PdpError::PredictionError(format!(
                        "class '{}' not among model classes [{}]",
                        class,
                        m.classes.join(", ")
                    ))
                })?;
                Ok(Prediction::single(probs.swap_remove(idx)))
            }
            None => Prediction::multi(m.classes.iter().cloned().zip(probs).collect()),
        }
    }
}

/// Adapter for [`FnModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FnModelAdapter;

impl PredictionAdapter for FnModelAdapter {
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
        downcast::<FnModel>(model, FN_TAG)?.call(rows)
    }
}

/// Adapter for [`MatrixModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixModelAdapter;

impl PredictionAdapter for MatrixModelAdapter {
    fn predict(&self, model: &dyn Model, rows: &Dataset) -> Result<Prediction> {
        let values = downcast::<MatrixModel>(model, MATRIX_TAG)?.call(rows)?;
        Ok(Prediction::single(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn rows() -> Dataset {
        Dataset::new(vec![Column::numeric("x", vec![-1.0, 0.0, 1.0])]).unwrap()
    }

    #[test]
    fn test_logistic_centered_logit_is_half_eta() {
        let model = LogisticModel::new(LinearModel::new(0.0).with_coefficient("x", 2.0));
        let pred = LogisticAdapter::new(ClassScale::CenteredLogit)
            .predict(&model, &rows())
            .unwrap();
        let expected = [-1.0, 0.0, 1.0];
        for (v, e) in pred.channel(0).iter().zip(expected) {
            assert!((v - e).abs() < 1e-9);
        }
    }

    #[test]
    fn test_softmax_channels() {
        let model = SoftmaxModel::new(
            vec!["lo".into(), "hi".into()],
            vec![LinearModel::new(0.0), LinearModel::new(0.0).with_coefficient("x", 1.0)],
        )
        .unwrap();

        let all = SoftmaxAdapter::new(ClassScale::Probability)
            .predict(&model, &rows())
            .unwrap();
        assert_eq!(all.channel_names(), &["lo".to_string(), "hi".to_string()]);
        assert!((all.channel(1)[1] - 0.5).abs() < 1e-12);

        let focal = SoftmaxAdapter::new(ClassScale::Probability)
            .with_class("hi")
            .predict(&model, &rows())
            .unwrap();
        assert_eq!(focal.n_channels(), 1);
        assert_eq!(focal.channel(0), all.channel(1));

        let missing = SoftmaxAdapter::new(ClassScale::Probability)
            .with_class("nope")
            .predict(&model, &rows());
        assert!(missing.is_err());
    }

    #[test]
    fn test_softmax_centered_logits_sum_to_zero() {
        let model = SoftmaxModel::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                LinearModel::new(0.3),
                LinearModel::new(0.0).with_coefficient("x", 1.0),
                LinearModel::new(-0.2),
            ],
        )
        .unwrap();
        let pred = SoftmaxAdapter::new(ClassScale::CenteredLogit)
            .predict(&model, &rows())
            .unwrap();
        for i in 0..3 {
            let total: f64 = (0..3).map(|c| pred.channel(c)[i]).sum();
            assert!(total.abs() < 1e-9);
        }
    }

    #[test]
    fn test_wrong_model_type() {
        let model = LinearModel::new(0.0);
        assert!(LogisticAdapter::default().predict(&model, &rows()).is_err());
    }
}
