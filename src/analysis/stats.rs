//! Descriptive statistics over similarity values and scores.

use crate::models::serialize_rounded;
use serde::{Deserialize, Serialize};

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation; 0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Summary of a distribution of values.
///
/// Quantiles use the nearest rank at `floor(count × p)` of the sorted values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    #[serde(serialize_with = "serialize_rounded")]
    pub min: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub max: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub mean: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub median: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub q1: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub q3: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub std_dev: f64,
}

impl DistributionStats {
    /// `None` for an empty input.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let at = |p: f64| sorted[((count as f64 * p).floor() as usize).min(count - 1)];

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: mean(&sorted),
            median: at(0.5),
            q1: at(0.25),
            q3: at(0.75),
            std_dev: population_std_dev(&sorted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
        assert!(DistributionStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(population_std_dev(&values), 2.0);
    }

    #[test]
    fn test_floor_index_quantiles() {
        let stats = DistributionStats::from_values(&[0.4, 0.1, 0.3, 0.2]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 0.1);
        assert_eq!(stats.max, 0.4);
        // floor(4 × 0.5) = 2 → third value
        assert_eq!(stats.median, 0.3);
        assert_eq!(stats.q1, 0.2);
        assert_eq!(stats.q3, 0.4);
    }

    #[test]
    fn test_single_value() {
        let stats = DistributionStats::from_values(&[0.8]).unwrap();
        assert_eq!(stats.median, 0.8);
        assert_eq!(stats.q3, 0.8);
        assert_eq!(stats.std_dev, 0.0);
    }
}
