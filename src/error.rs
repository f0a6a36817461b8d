//! Error types for partial dependence computation

use thiserror::Error;

/// Result type alias for partial dependence operations
pub type Result<T> = std::result::Result<T, PdpError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum PdpError {
    #[error("Invalid feature(s) [{}]: {reason}", .features.join(", "))]
    InvalidFeature {
        features: Vec<String>,
        reason: String,
    },

    #[error("Invalid grid for '{feature}': {reason}")]
    InvalidGrid { feature: String, reason: String },

    #[error(
        "Inconsistent prediction output at grid row {grid_row} ({grid_point}): expected channels [{}], got [{}]",
        .expected.join(", "),
        .actual.join(", ")
    )]
    InconsistentOutput {
        grid_row: usize,
        grid_point: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Prediction adapter failed at grid row {grid_row} ({grid_point}): {source}")]
    AdapterInvocation {
        grid_row: usize,
        grid_point: String,
        #[source]
        source: Box<PdpError>,
    },

    #[error("No prediction adapter registered for model type '{0}'")]
    UnknownModelType(String),

    #[error("Computation aborted after {completed} of {total} grid rows")]
    Aborted { completed: usize, total: usize },

    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl PdpError {
    /// Shorthand for a single-feature `InvalidFeature` error
    pub fn invalid_feature(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        PdpError::InvalidFeature {
            features: vec![feature.into()],
            reason: reason.into(),
        }
    }

    /// Shorthand for an `InvalidGrid` error
    pub fn invalid_grid(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        PdpError::InvalidGrid {
            feature: feature.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PdpError {
    fn from(err: polars::error::PolarsError) -> Self {
        PdpError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PdpError {
    fn from(err: serde_json::Error) -> Self {
        PdpError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PdpError {
    fn from(err: ndarray::ShapeError) -> Self {
        PdpError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PdpError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_invalid_feature_lists_names() {
        let err = PdpError::InvalidFeature {
            features: vec!["x1".to_string(), "x2".to_string()],
            reason: "not present in training data".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("x1, x2"));
        assert!(msg.contains("not present"));
    }

    #[test]
    fn test_adapter_error_carries_grid_point() {
        let err = PdpError::AdapterInvocation {
            grid_row: 3,
            grid_point: "x=2.5".to_string(),
            source: Box::new(PdpError::PredictionError("boom".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("grid row 3"));
        assert!(msg.contains("x=2.5"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_inconsistent_output_names_grid_point() {
        let err = PdpError::InconsistentOutput {
            grid_row: 2,
            grid_point: "x=5, g=b".to_string(),
            expected: vec!["a".to_string(), "b".to_string()],
            actual: vec!["a".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("grid row 2 (x=5, g=b)"));
        assert!(msg.contains("expected channels [a, b], got [a]"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PdpError = io_err.into();
        assert!(matches!(err, PdpError::IoError(_)));
    }
}
