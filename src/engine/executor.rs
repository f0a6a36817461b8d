//! Pluggable execution of the per-grid-row loop
//!
//! Grid rows are independent, so an executor is free to evaluate them in any
//! order on any number of workers, as long as it returns results in grid
//! order and stops at the first failure.

use super::{GridJob, RowOutput};
use crate::error::{PdpError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation flag, checked between grid rows
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the computation stop before the next grid row
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous abort request
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs every grid row of a job
pub trait Executor: Send + Sync {
    /// Evaluate all rows of `job`, returning outputs in grid order
    fn execute(&self, job: &GridJob<'_>, abort: &AbortHandle) -> Result<Vec<RowOutput>>;

    fn name(&self) -> &str;
}

/// Single-threaded executor with one reusable workspace
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn execute(&self, job: &GridJob<'_>, abort: &AbortHandle) -> Result<Vec<RowOutput>> {
        let total = job.len();
        let mut workspace = job.new_workspace()?;
        let mut outputs = Vec::with_capacity(total);
        for i in 0..total {
            if abort.is_aborted() {
                return Err(PdpError::Aborted {
                    completed: i,
                    total,
                });
            }
            outputs.push(job.evaluate(&mut workspace, i)?);
            debug!(grid_row = i, total, "Evaluated grid row");
        }
        Ok(outputs)
    }

    fn name(&self) -> &str {
        "sequential"
    }
}

/// Rayon thread-pool executor; each worker gets its own workspace
#[derive(Debug, Clone, Default)]
pub struct ThreadPoolExecutor {
    n_threads: Option<usize>,
}

impl ThreadPoolExecutor {
    /// Use the global rayon thread count
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n.max(1));
        self
    }

    /// Number of threads that will be used
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: &GridJob<'_>, abort: &AbortHandle) -> Result<Vec<RowOutput>> {
        let total = job.len();
        let completed = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()
            .map_err(|e| PdpError::ThreadPoolError(e.to_string()))?;

        pool.install(|| {
            (0..total)
                .into_par_iter()
                .map_init(
                    || job.new_workspace(),
                    |workspace, i| {
                        if abort.is_aborted() {
                            return Err(PdpError::Aborted {
                                completed: completed.load(Ordering::SeqCst),
                                total,
                            });
                        }
                        let workspace = match workspace {
                            Ok(ws) => ws,
                            Err(e) => return Err(PdpError::DataError(e.to_string())),
                        };
                        let out = job.evaluate(workspace, i)?;
                        completed.fetch_add(1, Ordering::SeqCst);
                        debug!(grid_row = i, total, "Evaluated grid row");
                        Ok(out)
                    },
                )
                .collect::<Result<Vec<_>>>()
        })
    }

    fn name(&self) -> &str {
        "thread_pool"
    }
}

/// Serializable executor selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    #[default]
    Sequential,
    ThreadPool,
}

impl ExecutorKind {
    /// Build the executor
    pub fn build(self, n_threads: Option<usize>) -> Arc<dyn Executor> {
        match self {
            ExecutorKind::Sequential => Arc::new(SequentialExecutor),
            ExecutorKind::ThreadPool => {
                let exec = ThreadPoolExecutor::new();
                Arc::new(match n_threads {
                    Some(n) => exec.with_threads(n),
                    None => exec,
                })
            }
        }
    }
}
