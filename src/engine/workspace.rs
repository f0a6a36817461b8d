//! Per-worker perturbation buffer
//!
//! Each worker owns one copy of the (possibly subsampled) training data and
//! overwrites the target columns in place for every grid row it evaluates.
//! Non-target columns are never touched, so no restore step is needed
//! between grid rows. Workspaces are never shared between workers.

use crate::data::{Dataset, Value};
use crate::error::{PdpError, Result};

/// Reusable perturbed copy of the training data
pub struct PerturbationWorkspace {
    data: Dataset,
    targets: Vec<usize>,
}

impl PerturbationWorkspace {
    /// Copy `base` and resolve the target column positions
    pub fn new(base: &Dataset, feature_names: &[String]) -> Result<Self> {
        let targets = feature_names
            .iter()
            .map(|name| {
                base.column_index(name)
                    .ok_or_else(|| PdpError::invalid_feature(name.clone(), "not present in training data"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            data: base.clone(),
            targets,
        })
    }

    /// Overwrite the target columns with one grid row and return the perturbed data
    pub fn apply(&mut self, grid_row: &[Value]) -> Result<&Dataset> {
        if grid_row.len() != self.targets.len() {
            return Err(PdpError::ShapeError {
                expected: format!("{} grid values", self.targets.len()),
                actual: format!("{}", grid_row.len()),
            });
        }
        for (&col, value) in self.targets.iter().zip(grid_row) {
            self.data.column_at_mut(col).fill(value)?;
        }
        Ok(&self.data)
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }
}
