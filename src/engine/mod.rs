//! Partial dependence averaging engine
//!
//! For every grid row the engine overwrites the target feature columns of a
//! working copy of the training data, asks the prediction adapter for one
//! prediction per training row, and either reduces those predictions with a
//! [`Summary`] (partial dependence) or keeps them all (ICE curves).
//!
//! The cost is `|grid| x |training rows|` predictions; [`PartialDependence::estimate_cost`]
//! reports it before any prediction is made so callers can subsample first.

mod executor;
mod summary;
mod workspace;

pub use executor::{
    AbortHandle, Executor, ExecutorKind, SequentialExecutor, ThreadPoolExecutor,
};
pub use summary::{column_name, InvLink, Summary, SummaryFn, SummaryKind};
pub use workspace::PerturbationWorkspace;

use crate::config::PdpConfig;
use crate::data::Dataset;
use crate::error::{PdpError, Result};
use crate::grid::{build_grid, Grid, GridConfig};
use crate::hull;
use crate::predict::{AdapterRegistry, Model, PredictionAdapter, SoftmaxAdapter, SOFTMAX_TAG};
use crate::table::{assemble, center, PdTable};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Default prediction count above which a warning is logged
pub const DEFAULT_WARN_THRESHOLD: usize = 10_000_000;

/// Upfront cost of a computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Rows in the grid
    pub grid_rows: usize,
    /// Training rows used as the integration basis (after subsampling)
    pub training_rows: usize,
    /// Adapter invocations (one per grid row)
    pub adapter_calls: usize,
    /// Individual predictions made
    pub predictions: usize,
    /// Rows in the resulting table
    pub output_rows: usize,
}

/// Output of one grid row: one or more named columns.
///
/// In aggregate mode each column holds a single value; in ICE mode it holds
/// one value per training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutput {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

/// Raw engine output before table assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictionResult {
    /// One summary per grid row; `values[g][c]`
    Aggregate {
        columns: Vec<String>,
        values: Vec<Vec<f64>>,
    },
    /// One prediction per grid row and training row; `values[g][c][r]`
    Ice {
        columns: Vec<String>,
        /// 1-based positions of the training rows in the caller's dataset
        row_ids: Vec<usize>,
        values: Vec<Vec<Vec<f64>>>,
    },
}

impl PredictionResult {
    pub fn columns(&self) -> &[String] {
        match self {
            PredictionResult::Aggregate { columns, .. } => columns,
            PredictionResult::Ice { columns, .. } => columns,
        }
    }

    /// Number of grid rows covered
    pub fn grid_rows(&self) -> usize {
        match self {
            PredictionResult::Aggregate { values, .. } => values.len(),
            PredictionResult::Ice { values, .. } => values.len(),
        }
    }

    pub fn is_ice(&self) -> bool {
        matches!(self, PredictionResult::Ice { .. })
    }
}

/// Everything a worker needs to evaluate grid rows
pub struct GridJob<'a> {
    model: &'a dyn Model,
    adapter: &'a dyn PredictionAdapter,
    grid: &'a Grid,
    basis: &'a Dataset,
    ice: bool,
    summary: &'a Summary,
    inv_link: InvLink,
}

impl<'a> GridJob<'a> {
    /// Number of grid rows
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Fresh private workspace for one worker
    pub fn new_workspace(&self) -> Result<PerturbationWorkspace> {
        PerturbationWorkspace::new(self.basis, self.grid.feature_names())
    }

    /// Evaluate grid row `i` using `workspace`
    pub fn evaluate(&self, workspace: &mut PerturbationWorkspace, i: usize) -> Result<RowOutput> {
        let grid_row = self.grid.row(i).ok_or_else(|| {
            PdpError::invalid_grid(
                self.grid.feature_names().join(", "),
                format!("grid row {} out of range", i),
            )
        })?;
        let rows = workspace.apply(grid_row)?;
        let n_rows = rows.n_rows();

        let wrap = |source: PdpError| PdpError::AdapterInvocation {
            grid_row: i,
            grid_point: self.grid.describe_row(i),
            source: Box::new(source),
        };

        let mut prediction = self.adapter.predict(self.model, rows).map_err(wrap)?;
        if prediction.n_rows() != n_rows {
            return Err(wrap(PdpError::ShapeError {
                expected: format!("{} predictions", n_rows),
                actual: format!("{}", prediction.n_rows()),
            }));
        }
        if self.inv_link != InvLink::Identity {
            let link = self.inv_link;
            prediction = prediction.map_values(|v| link.apply(v));
        }

        if self.ice {
            let (columns, values) = prediction
                .iter()
                .map(|(name, v)| (name.to_string(), v.to_vec()))
                .unzip();
            return Ok(RowOutput { columns, values });
        }

        let n_channels = prediction.n_channels();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (channel, v) in prediction.iter() {
            let stats = self.summary.apply(v);
            let n_stats = stats.len();
            for (stat, value) in stats {
                columns.push(column_name(channel, &stat, n_channels, n_stats));
                values.push(vec![value]);
            }
        }
        Ok(RowOutput { columns, values })
    }
}

/// Partial dependence / ICE calculator
pub struct PartialDependence<'m> {
    /// Fitted model
    model: &'m dyn Model,
    /// Prediction extraction for the model
    adapter: Arc<dyn PredictionAdapter>,
    /// Grid construction settings
    grid_config: GridConfig,
    /// Keep per-row curves instead of averaging
    ice: bool,
    /// Center curves at their first grid point
    center: bool,
    /// Flag bivariate grid points outside the training convex hull
    chull: bool,
    /// Training rows to subsample before the main loop
    subsample: Option<usize>,
    /// Seed for subsampling
    seed: u64,
    summary: Summary,
    inv_link: InvLink,
    executor: Arc<dyn Executor>,
    abort: AbortHandle,
    warn_threshold: usize,
}

impl<'m> PartialDependence<'m> {
    /// Calculator using the built-in adapter registry
    pub fn new(model: &'m dyn Model) -> Result<Self> {
        Self::with_registry(model, &AdapterRegistry::with_defaults())
    }

    /// Calculator resolving the model's adapter from `registry`
    pub fn with_registry(model: &'m dyn Model, registry: &AdapterRegistry) -> Result<Self> {
        let adapter = registry.resolve(model)?;
        Ok(Self::with_adapter(model, adapter))
    }

    /// Calculator with an explicit adapter, for model types without a registry entry
    pub fn with_adapter(model: &'m dyn Model, adapter: Arc<dyn PredictionAdapter>) -> Self {
        Self {
            model,
            adapter,
            grid_config: GridConfig::default(),
            ice: false,
            center: false,
            chull: false,
            subsample: None,
            seed: 0,
            summary: Summary::Mean,
            inv_link: InvLink::Identity,
            executor: Arc::new(SequentialExecutor),
            abort: AbortHandle::new(),
            warn_threshold: DEFAULT_WARN_THRESHOLD,
        }
    }

    /// Calculator configured from a [`PdpConfig`]
    pub fn from_config(model: &'m dyn Model, config: &PdpConfig) -> Result<Self> {
        config.validate()?;
        let mut registry = AdapterRegistry::with_class_scale(config.class_scale);
        if let Some(class) = &config.which_class {
            if model.type_tag() == SOFTMAX_TAG {
                registry.register(
                    SOFTMAX_TAG,
                    SoftmaxAdapter::new(config.class_scale).with_class(class.clone()),
                );
            } else {
                warn!(
                    model_type = model.type_tag(),
                    class = %class,
                    "Focal class only applies to multi-class models; ignoring"
                );
            }
        }
        let mut pd = Self::with_registry(model, &registry)?
            .with_grid_config(config.grid.clone())
            .with_ice(config.ice)
            .with_center(config.center)
            .with_chull(config.chull)
            .with_seed(config.seed)
            .with_summary(config.summary.into())
            .with_inv_link(config.inv_link)
            .with_executor(config.executor.build(config.n_threads))
            .with_warn_threshold(config.warn_threshold);
        if let Some(k) = config.subsample {
            pd = pd.with_subsample(k);
        }
        Ok(pd)
    }

    /// Set grid configuration
    pub fn with_grid_config(mut self, config: GridConfig) -> Self {
        self.grid_config = config;
        self
    }

    /// Set grid resolution
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.grid_config.resolution = resolution;
        self
    }

    /// Return ICE curves instead of the average
    pub fn with_ice(mut self, ice: bool) -> Self {
        self.ice = ice;
        self
    }

    /// Center each curve at its first grid point
    pub fn with_center(mut self, center: bool) -> Self {
        self.center = center;
        self
    }

    /// Flag grid points outside the training convex hull (two features only)
    pub fn with_chull(mut self, chull: bool) -> Self {
        self.chull = chull;
        self
    }

    /// Subsample `k` training rows once before the main loop
    pub fn with_subsample(mut self, k: usize) -> Self {
        self.subsample = Some(k);
        self
    }

    /// Seed for subsampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the summary function
    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = summary;
        self
    }

    /// Set the inverse link applied before aggregation
    pub fn with_inv_link(mut self, inv_link: InvLink) -> Self {
        self.inv_link = inv_link;
        self
    }

    /// Set the executor for the grid-row loop
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Share an abort handle with the caller
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Prediction count above which a warning is logged
    pub fn with_warn_threshold(mut self, threshold: usize) -> Self {
        self.warn_threshold = threshold;
        self
    }

    /// Handle that aborts this calculator between grid rows
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Build the grid for `features`
    pub fn grid<S: AsRef<str>>(&self, features: &[S], training: &Dataset) -> Result<Grid> {
        build_grid(features, training, &self.grid_config)
    }

    /// Cost of computing `features` without making any prediction
    pub fn estimate_cost<S: AsRef<str>>(
        &self,
        features: &[S],
        training: &Dataset,
    ) -> Result<CostEstimate> {
        let grid = self.grid(features, training)?;
        Ok(self.estimate_cost_for_grid(&grid, training))
    }

    /// Cost of evaluating an existing grid
    pub fn estimate_cost_for_grid(&self, grid: &Grid, training: &Dataset) -> CostEstimate {
        let training_rows = match self.subsample {
            Some(k) => k.min(training.n_rows()),
            None => training.n_rows(),
        };
        let predictions = grid.len().saturating_mul(training_rows);
        CostEstimate {
            grid_rows: grid.len(),
            training_rows,
            adapter_calls: grid.len(),
            predictions,
            output_rows: if self.ice { predictions } else { grid.len() },
        }
    }

    /// Full pipeline: grid, averaging, centering, hull masking, assembly
    pub fn compute<S: AsRef<str>>(&self, features: &[S], training: &Dataset) -> Result<PdTable> {
        let grid = self.grid(features, training)?;
        self.compute_with_grid(&grid, training)
    }

    /// Full pipeline over a caller-supplied grid
    pub fn compute_with_grid(&self, grid: &Grid, training: &Dataset) -> Result<PdTable> {
        let result = self.evaluate_grid(grid, training)?;

        let flags = if self.chull {
            self.hull_flags(grid, training)
        } else {
            None
        };

        let table = assemble(grid, &result, false, flags.as_ref())?;
        if self.center {
            Ok(center(&table))
        } else {
            Ok(table)
        }
    }

    /// Averaging engine: predictions for every grid row
    pub fn evaluate_grid(&self, grid: &Grid, training: &Dataset) -> Result<PredictionResult> {
        grid.validate_against(training)?;
        if training.is_empty() {
            return Err(PdpError::DataError("training data has no rows".to_string()));
        }

        let cost = self.estimate_cost_for_grid(grid, training);
        if cost.predictions > self.warn_threshold {
            warn!(
                grid_rows = cost.grid_rows,
                training_rows = cost.training_rows,
                predictions = cost.predictions,
                "Large partial dependence computation; consider a coarser grid or subsampling"
            );
        }
        info!(
            features = ?grid.feature_names(),
            grid_rows = cost.grid_rows,
            training_rows = cost.training_rows,
            predictions = cost.predictions,
            ice = self.ice,
            executor = self.executor.name(),
            "Computing partial dependence"
        );

        let (basis, row_ids) = self.integration_basis(training)?;
        let job = GridJob {
            model: self.model,
            adapter: self.adapter.as_ref(),
            grid,
            basis: &basis,
            ice: self.ice,
            summary: &self.summary,
            inv_link: self.inv_link,
        };

        let start = Instant::now();
        let outputs = self.executor.execute(&job, &self.abort)?;
        let columns = check_channels(grid, &outputs)?;

        info!(
            grid_rows = outputs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Partial dependence complete"
        );

        if self.ice {
            Ok(PredictionResult::Ice {
                columns,
                row_ids,
                values: outputs.into_iter().map(|o| o.values).collect(),
            })
        } else {
            Ok(PredictionResult::Aggregate {
                columns,
                values: outputs
                    .into_iter()
                    .map(|o| o.values.into_iter().map(|v| v[0]).collect())
                    .collect(),
            })
        }
    }

    /// Training rows used for every grid point, plus their 1-based ids
    fn integration_basis(&self, training: &Dataset) -> Result<(Dataset, Vec<usize>)> {
        let n = training.n_rows();
        match self.subsample {
            Some(k) if k < n => {
                if k == 0 {
                    return Err(PdpError::ConfigError(
                        "subsample size must be positive".to_string(),
                    ));
                }
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                let mut rows = rand::seq::index::sample(&mut rng, n, k).into_vec();
                rows.sort_unstable();
                let ids = rows.iter().map(|r| r + 1).collect();
                Ok((training.select_rows(&rows)?, ids))
            }
            _ => Ok((training.clone(), (1..=n).collect())),
        }
    }

    fn hull_flags(&self, grid: &Grid, training: &Dataset) -> Option<BTreeSet<usize>> {
        let names = grid.feature_names();
        if names.len() != 2 {
            warn!(features = ?names, "Convex hull masking needs exactly two features; skipping");
            return None;
        }
        let (x, y) = match (training.numeric(&names[0]), training.numeric(&names[1])) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                warn!(features = ?names, "Convex hull masking needs numeric features; skipping");
                return None;
            }
        };
        let train_points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        let grid_points: Vec<(f64, f64)> = grid
            .rows()
            .iter()
            .map(|r| {
                (
                    r[0].as_f64().unwrap_or(f64::NAN),
                    r[1].as_f64().unwrap_or(f64::NAN),
                )
            })
            .collect();
        Some(hull::mask(&grid_points, &train_points))
    }
}

/// The first grid row fixes the output column set; every other row must match
fn check_channels(grid: &Grid, outputs: &[RowOutput]) -> Result<Vec<String>> {
    let expected = match outputs.first() {
        Some(first) => first.columns.clone(),
        None => return Ok(Vec::new()),
    };
    for (i, out) in outputs.iter().enumerate().skip(1) {
        if out.columns != expected {
            return Err(PdpError::InconsistentOutput {
                grid_row: i,
                grid_point: grid.describe_row(i),
                expected,
                actual: out.columns.clone(),
            });
        }
    }
    Ok(expected)
}
