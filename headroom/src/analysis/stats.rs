//! Descriptive statistics over one metric.

use average::Variance;
use headroom_capture::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Summary statistics of a series. All zero when there are no observations.
pub struct Statistics {
    /// Number of observations
    pub count: usize,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Middle value, or the mean of the two middle values
    pub median: f64,
    /// 75th percentile, nearest rank
    pub p75: f64,
    /// 95th percentile, nearest rank
    pub p95: f64,
    /// Sample standard deviation
    pub std: f64,
    /// Sample variance
    pub variance: f64,
}

impl Statistics {
    /// Compute statistics over `values`.
    ///
    /// Percentiles take the element at index `floor(n * k)` of the sorted
    /// values, clamped to the last element. Variance uses `n - 1` and is 0
    /// for a single observation.
    #[must_use]
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        if sorted.is_empty() {
            return Self::default();
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let var: Variance = sorted.iter().copied().collect();
        let variance = if n > 1 { var.sample_variance() } else { 0.0 };

        Self {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean: var.mean(),
            median: median(&sorted),
            p75: percentile(&sorted, 0.75),
            p95: percentile(&sorted, 0.95),
            std: variance.sqrt(),
            variance,
        }
    }
}

/// Statistics over every numeric value of `metric` in `dataset`.
#[must_use]
pub fn calculate(dataset: &Dataset, metric: &str) -> Statistics {
    Statistics::from_values(dataset.values(metric))
}

/// Nearest-rank percentile of already sorted values. 0.0 when empty.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentile(sorted: &[f64], k: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * k).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
