//! Centered ICE (c-ICE)

use super::PdTable;
use std::collections::HashMap;

/// Shift every curve so that it starts at zero.
///
/// Each ICE curve (or the single partial dependence curve) has its value at
/// its first grid row subtracted from all of its points, separately for
/// every value column. Applying this to an already centered table changes
/// nothing.
pub fn center(table: &PdTable) -> PdTable {
    let mut out = table.clone();

    let mut baselines: HashMap<Option<usize>, Vec<f64>> = HashMap::new();
    for record in table.records() {
        baselines
            .entry(record.id)
            .or_insert_with(|| record.values.clone());
    }

    for record in out.records_mut() {
        if let Some(base) = baselines.get(&record.id) {
            for (v, b) in record.values.iter_mut().zip(base) {
                *v -= b;
            }
        }
    }
    out.set_centered(true);
    out
}
