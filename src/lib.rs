//! PDP - Partial dependence and ICE curves for black-box models
//!
//! This crate computes how a fitted model's predictions respond to one, two,
//! or three features when the remaining features are averaged out over the
//! training data:
//! - Grid construction over continuous and categorical features
//! - Monte Carlo averaging engine with pluggable executors
//! - Individual conditional expectation (ICE) and centered ICE curves
//! - Convex hull masking of bivariate extrapolation
//!
//! # Modules
//!
//! ## Core
//! - [`grid`] - Sweep values per feature and their Cartesian product
//! - [`engine`] - Averaging engine, summaries, executors
//! - [`table`] - Result assembly, centering, interaction diagnostics
//! - [`hull`] - Convex hull masking
//!
//! ## Models and data
//! - [`predict`] - Model handles and prediction adapters
//! - [`data`] - Training data, CSV/JSON loading
//!
//! ## Services
//! - [`config`] - Run configuration
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use pdp::prelude::*;
//!
//! # fn main() -> pdp::Result<()> {
//! let data = load_csv("train.csv")?;
//! let model = LinearModel::new(0.5).with_coefficient("x", 2.0);
//! let table = PartialDependence::new(&model)?
//!     .with_resolution(25)
//!     .with_ice(true)
//!     .with_center(true)
//!     .compute(&["x"], &data)?;
//! table.write_csv("pd.csv")?;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Data and models
pub mod data;
pub mod predict;

// Core computation
pub mod grid;
pub mod engine;
pub mod table;
pub mod hull;

// Services
pub mod config;
pub mod cli;

pub use error::{PdpError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PdpError, Result};

    // Data
    pub use crate::data::{load_csv, Column, DataLoader, Dataset, Value};

    // Models
    pub use crate::predict::{
        AdapterRegistry, ClassScale, FnModel, LinearModel, LogisticModel, MatrixModel, Model,
        ModelSpec, Prediction, PredictionAdapter, SoftmaxModel,
    };

    // Grid
    pub use crate::grid::{build_grid, Grid, GridConfig, GridMethod};

    // Engine
    pub use crate::engine::{
        AbortHandle, CostEstimate, Executor, ExecutorKind, InvLink, PartialDependence,
        SequentialExecutor, Summary, ThreadPoolExecutor,
    };

    // Results
    pub use crate::table::{center, PdTable, Record};

    // Config
    pub use crate::config::PdpConfig;
}
