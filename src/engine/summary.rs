//! Reduction of per-row predictions to summary statistics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// User-supplied summary: per-row values in, named statistics out
pub type SummaryFn = Arc<dyn Fn(&[f64]) -> Vec<(String, f64)> + Send + Sync>;

/// How per-row predictions are aggregated at each grid point
#[derive(Clone, Default)]
pub enum Summary {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Mean with mean ± one standard deviation as `lower` / `upper`
    MeanSd,
    /// Median
    Median,
    /// Caller-defined statistics; must return the same names for every grid point
    Custom(SummaryFn),
}

impl Summary {
    /// Wrap a closure as a custom summary
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<(String, f64)> + Send + Sync + 'static,
    {
        Summary::Custom(Arc::new(f))
    }

    /// Compute the statistics for one channel
    pub fn apply(&self, values: &[f64]) -> Vec<(String, f64)> {
        match self {
            Summary::Mean => vec![("mean".to_string(), mean(values))],
            Summary::MeanSd => {
                let m = mean(values);
                let sd = std_dev(values, m);
                vec![
                    ("mean".to_string(), m),
                    ("lower".to_string(), m - sd),
                    ("upper".to_string(), m + sd),
                ]
            }
            Summary::Median => vec![("median".to_string(), median(values))],
            Summary::Custom(f) => f(values),
        }
    }
}

impl fmt::Debug for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::Mean => write!(f, "Mean"),
            Summary::MeanSd => write!(f, "MeanSd"),
            Summary::Median => write!(f, "Median"),
            Summary::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Serializable subset of [`Summary`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    #[default]
    Mean,
    MeanSd,
    Median,
}

impl From<SummaryKind> for Summary {
    fn from(kind: SummaryKind) -> Self {
        match kind {
            SummaryKind::Mean => Summary::Mean,
            SummaryKind::MeanSd => Summary::MeanSd,
            SummaryKind::Median => Summary::Median,
        }
    }
}

/// Output column name for one statistic of one channel.
///
/// A single statistic keeps the channel name, so the default mean summary
/// produces `yhat`. With several statistics on a single `yhat` channel the
/// statistic names are used as-is; otherwise they are prefixed with the channel.
pub fn column_name(channel: &str, stat: &str, n_channels: usize, n_stats: usize) -> String {
    if n_stats == 1 {
        channel.to_string()
    } else if n_channels == 1 && channel == crate::predict::DEFAULT_CHANNEL {
        stat.to_string()
    } else {
        format!("{}.{}", channel, stat)
    }
}

/// Inverse link applied to predictions before aggregation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvLink {
    #[default]
    Identity,
    Logistic,
    Exp,
}

impl InvLink {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            InvLink::Identity => x,
            InvLink::Logistic => crate::predict::sigmoid(x),
            InvLink::Exp => x.exp(),
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_median() {
        assert_eq!(Summary::Mean.apply(&[1.0, 2.0, 6.0])[0].1, 3.0);
        assert_eq!(Summary::Median.apply(&[1.0, 2.0, 6.0])[0].1, 2.0);
        assert_eq!(Summary::Median.apply(&[1.0, 2.0, 4.0, 6.0])[0].1, 3.0);
    }

    #[test]
    fn test_mean_sd_bounds() {
        let stats = Summary::MeanSd.apply(&[1.0, 3.0]);
        let sd = 2.0_f64.sqrt();
        assert_eq!(stats[0], ("mean".to_string(), 2.0));
        assert!((stats[1].1 - (2.0 - sd)).abs() < 1e-12);
        assert!((stats[2].1 - (2.0 + sd)).abs() < 1e-12);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name("yhat", "mean", 1, 1), "yhat");
        assert_eq!(column_name("yhat", "lower", 1, 3), "lower");
        assert_eq!(column_name("setosa", "lower", 3, 3), "setosa.lower");
        assert_eq!(column_name("setosa", "mean", 3, 1), "setosa");
    }

    #[test]
    fn test_inv_link() {
        assert_eq!(InvLink::Identity.apply(2.0), 2.0);
        assert!((InvLink::Logistic.apply(0.0) - 0.5).abs() < 1e-12);
        assert!((InvLink::Exp.apply(0.0) - 1.0).abs() < 1e-12);
    }
}
