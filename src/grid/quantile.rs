//! Sample quantiles and range helpers used by the grid builder

use std::cmp::Ordering;

/// Sort values ascending, dropping NaNs and infinities
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Linear-interpolation quantile of already sorted data.
///
/// `p` is clamped to [0, 1]. Uses the (n - 1) * p position with linear
/// interpolation between neighbours, so p = 0 and p = 1 return the observed
/// minimum and maximum exactly.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let p = p.clamp(0.0, 1.0);
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Quantiles of sorted data at each probability
pub fn quantiles_sorted(sorted: &[f64], probs: &[f64]) -> Vec<f64> {
    probs.iter().map(|&p| quantile_sorted(sorted, p)).collect()
}

/// `n` evenly spaced probabilities from 0 to 1 inclusive
pub fn even_probs(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// `n` evenly spaced values from `min` to `max` inclusive
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { max } else { min + i as f64 * step })
                .collect()
        }
    }
}

/// Tukey fences: [Q1 - 1.5 IQR, Q3 + 1.5 IQR]
pub fn tukey_fences(sorted: &[f64]) -> (f64, f64) {
    let q1 = quantile_sorted(sorted, 0.25);
    let q3 = quantile_sorted(sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - 1.5 * iqr, q3 + 1.5 * iqr)
}

/// Drop values outside the Tukey fences; input and output are sorted
pub fn trim_outliers(sorted: &[f64]) -> Vec<f64> {
    if sorted.len() < 4 {
        return sorted.to_vec();
    }
    let (lo, hi) = tukey_fences(sorted);
    sorted
        .iter()
        .copied()
        .filter(|&v| v >= lo && v <= hi)
        .collect()
}

/// Remove consecutive equal values from sorted data
pub fn dedup_sorted(values: &mut Vec<f64>) {
    values.dedup_by(|a, b| a == b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_endpoints() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert!((quantile_sorted(&sorted, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_linspace() {
        let v = linspace(0.0, 10.0, 5);
        assert_eq!(v, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(linspace(3.0, 3.0, 1), vec![3.0]);
    }

    #[test]
    fn test_even_probs() {
        assert_eq!(even_probs(3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_trim_outliers() {
        let sorted = sorted_finite(&[1.0, 2.0, 2.5, 3.0, 3.5, 4.0, 100.0]);
        let trimmed = trim_outliers(&sorted);
        assert!(!trimmed.contains(&100.0));
        assert_eq!(trimmed.len(), 6);
    }

    #[test]
    fn test_sorted_finite_drops_nan() {
        let s = sorted_finite(&[3.0, f64::NAN, 1.0]);
        assert_eq!(s, vec![1.0, 3.0]);
    }

    #[test]
    fn test_sorted_finite_drops_infinities() {
        let s = sorted_finite(&[f64::INFINITY, 2.0, f64::NEG_INFINITY, 0.5]);
        assert_eq!(s, vec![0.5, 2.0]);
    }
}
