//! Partial dependence configuration

use crate::engine::{ExecutorKind, InvLink, SummaryKind, DEFAULT_WARN_THRESHOLD};
use crate::error::{PdpError, Result};
use crate::grid::{check_feature_names, GridConfig, GridMethod};
use crate::predict::ClassScale;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one partial dependence run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    /// Features to sweep (one to three); may be supplied on the command line instead
    pub features: Vec<String>,

    /// Grid construction
    pub grid: GridConfig,

    /// Return one curve per training row instead of the average
    pub ice: bool,

    /// Center curves at their first grid point
    pub center: bool,

    /// Flag bivariate grid points outside the training convex hull
    pub chull: bool,

    /// Training rows to subsample before computing
    pub subsample: Option<usize>,

    /// Seed for subsampling
    pub seed: u64,

    /// Aggregation at each grid point
    pub summary: SummaryKind,

    /// Inverse link applied to raw predictions
    pub inv_link: InvLink,

    /// Grid-row executor
    pub executor: ExecutorKind,

    /// Worker threads for the thread-pool executor
    pub n_threads: Option<usize>,

    /// Prediction count above which a warning is logged
    pub warn_threshold: usize,

    /// Output scale for classifiers
    pub class_scale: ClassScale,

    /// Single class to report for multi-class models
    pub which_class: Option<String>,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            grid: GridConfig::default(),
            ice: false,
            center: false,
            chull: false,
            subsample: None,
            seed: 0,
            summary: SummaryKind::Mean,
            inv_link: InvLink::Identity,
            executor: ExecutorKind::Sequential,
            n_threads: None,
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            class_scale: ClassScale::default(),
            which_class: None,
        }
    }
}

impl PdpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set features
    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Set grid configuration
    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    /// Set ICE mode
    pub fn with_ice(mut self, ice: bool) -> Self {
        self.ice = ice;
        self
    }

    /// Set centering
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    /// Set convex hull masking
    pub fn with_chull(mut self, chull: bool) -> Self {
        self.chull = chull;
        self
    }

    /// Set subsample size
    pub fn with_subsample(mut self, k: usize) -> Self {
        self.subsample = Some(k);
        self
    }

    /// Set seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use the thread-pool executor with `n` threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.executor = ExecutorKind::ThreadPool;
        self.n_threads = Some(n);
        self
    }

    /// Set the focal class for multi-class models
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.which_class = Some(class.into());
        self
    }

    /// Check settings that do not depend on the data
    pub fn validate(&self) -> Result<()> {
        if !self.features.is_empty() {
            check_feature_names(&self.features)?;
        }
        let label = if self.features.is_empty() {
            "grid".to_string()
        } else {
            self.features.join(", ")
        };
        if self.grid.resolution <= 1 {
            return Err(PdpError::invalid_grid(
                label,
                format!("resolution must be greater than 1, got {}", self.grid.resolution),
            ));
        }
        if let GridMethod::Probs(probs) = &self.grid.method {
            if probs.is_empty() || probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(PdpError::invalid_grid(
                    label,
                    "quantile probabilities must be non-empty and within [0, 1]",
                ));
            }
        }
        if self.subsample == Some(0) {
            return Err(PdpError::ConfigError(
                "subsample size must be positive".to_string(),
            ));
        }
        if self.n_threads == Some(0) {
            return Err(PdpError::ConfigError(
                "thread count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PdpConfig::default();
        assert_eq!(config.grid.resolution, 51);
        assert!(!config.ice);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(PdpConfig::new().with_subsample(0).validate().is_err());
        assert!(PdpConfig::new()
            .with_features(["a", "b", "c", "d"])
            .validate()
            .is_err());
        assert!(PdpConfig::new().with_threads(0).validate().is_err());
    }

    #[test]
    fn test_degenerate_grid_settings_are_grid_errors() {
        let res = PdpConfig::new()
            .with_features(["x"])
            .with_grid(GridConfig::default().with_resolution(1))
            .validate();
        assert!(matches!(res, Err(PdpError::InvalidGrid { ref feature, .. }) if feature == "x"));

        let res = PdpConfig::new()
            .with_grid(GridConfig::default().with_method(GridMethod::Probs(vec![0.5, 1.5])))
            .validate();
        assert!(matches!(res, Err(PdpError::InvalidGrid { .. })));

        let res = PdpConfig::new()
            .with_grid(GridConfig::default().with_method(GridMethod::Probs(Vec::new())))
            .validate();
        assert!(matches!(res, Err(PdpError::InvalidGrid { .. })));
    }

    #[test]
    fn test_json_round_trip_with_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdp.json");
        std::fs::write(&path, r#"{"ice": true, "grid": {"resolution": 7}}"#).unwrap();
        let config = PdpConfig::from_json_file(&path).unwrap();
        assert!(config.ice);
        assert_eq!(config.grid.resolution, 7);
        assert_eq!(config.seed, 0);

        let out = dir.path().join("out.json");
        config.with_threads(2).to_json_file(&out).unwrap();
        let back = PdpConfig::from_json_file(&out).unwrap();
        assert_eq!(back.executor, ExecutorKind::ThreadPool);
        assert_eq!(back.n_threads, Some(2));
    }
}
