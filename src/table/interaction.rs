//! Interaction diagnostics derived from result tables

use super::PdTable;
use crate::error::{PdpError, Result};
use std::collections::HashMap;

/// Average spread of ICE curves around their mean.
///
/// For every grid row, the standard deviation of the ICE values is taken;
/// the result is the mean of those deviations. Parallel curves give values
/// close to zero once centered, so this is most useful on c-ICE tables.
pub fn ice_heterogeneity(table: &PdTable, column: &str) -> Result<f64> {
    if !table.is_ice() {
        return Err(PdpError::DataError(
            "heterogeneity needs an ICE table".to_string(),
        ));
    }
    let idx = column_index(table, column)?;

    let mut groups: Vec<Vec<f64>> = Vec::new();
    let mut last_row = None;
    for r in table.records() {
        if last_row != Some(r.grid_row) {
            groups.push(Vec::new());
            last_row = Some(r.grid_row);
        }
        if let Some(g) = groups.last_mut() {
            g.push(r.values[idx]);
        }
    }
    if groups.is_empty() {
        return Ok(0.0);
    }

    let total: f64 = groups
        .iter()
        .map(|g| {
            let n = g.len() as f64;
            let mean = g.iter().sum::<f64>() / n;
            (g.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
        })
        .sum();
    Ok(total / groups.len() as f64)
}

/// Friedman's H² statistic for a pair of features.
///
/// `pd_joint` is the bivariate partial dependence table; `pd_first` and
/// `pd_second` are the univariate tables over the same axis values. All three
/// functions are mean-centered over the grid before comparing, and the
/// statistic is the share of the joint variance not explained by the sum of
/// the two univariate effects. Zero means no interaction.
pub fn h_statistic(
    pd_joint: &PdTable,
    pd_first: &PdTable,
    pd_second: &PdTable,
    column: &str,
) -> Result<f64> {
    if pd_joint.feature_names().len() != 2
        || pd_first.feature_names().len() != 1
        || pd_second.feature_names().len() != 1
    {
        return Err(PdpError::DataError(
            "H statistic needs one bivariate and two univariate tables".to_string(),
        ));
    }
    if pd_joint.is_ice() || pd_first.is_ice() || pd_second.is_ice() {
        return Err(PdpError::DataError(
            "H statistic needs partial dependence tables, not ICE".to_string(),
        ));
    }
    if pd_first.feature_names()[0] != pd_joint.feature_names()[0]
        || pd_second.feature_names()[0] != pd_joint.feature_names()[1]
    {
        return Err(PdpError::DataError(format!(
            "univariate tables must cover {:?} in order",
            pd_joint.feature_names()
        )));
    }

    let lookup_first = lookup(pd_first, column)?;
    let lookup_second = lookup(pd_second, column)?;
    let joint_idx = column_index(pd_joint, column)?;

    let mut joint = Vec::with_capacity(pd_joint.len());
    let mut first = Vec::with_capacity(pd_joint.len());
    let mut second = Vec::with_capacity(pd_joint.len());
    for r in pd_joint.records() {
        let a = r.features[0].to_string();
        let b = r.features[1].to_string();
        let (Some(&fa), Some(&fb)) = (lookup_first.get(&a), lookup_second.get(&b)) else {
            return Err(PdpError::DataError(format!(
                "grid point ({}, {}) missing from univariate tables",
                a, b
            )));
        };
        joint.push(r.values[joint_idx]);
        first.push(fa);
        second.push(fb);
    }

    demean(&mut joint);
    demean(&mut first);
    demean(&mut second);

    let ss_total: f64 = joint.iter().map(|v| v * v).sum();
    if ss_total <= 0.0 {
        return Ok(0.0);
    }
    let ss_residual: f64 = joint
        .iter()
        .zip(&first)
        .zip(&second)
        .map(|((j, a), b)| (j - a - b).powi(2))
        .sum();
    Ok(ss_residual / ss_total)
}

fn column_index(table: &PdTable, column: &str) -> Result<usize> {
    table
        .value_columns()
        .iter()
        .position(|c| c == column)
        .ok_or_else(|| PdpError::DataError(format!("no value column '{}'", column)))
}

fn lookup(table: &PdTable, column: &str) -> Result<HashMap<String, f64>> {
    let idx = column_index(table, column)?;
    Ok(table
        .records()
        .iter()
        .map(|r| (r.features[0].to_string(), r.values[idx]))
        .collect())
}

fn demean(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter_mut().for_each(|v| *v -= mean);
}
