//! Descriptive statistics for a numeric series.
//!
//! Computed on demand from the current buffer contents; there is no
//! incremental state to keep consistent with window eviction.

use serde::Serialize;

/// Summary statistics for one sensor field over its trend buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub median: f64,
    pub std_deviation: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_95: f64,
    pub outlier_count: usize,
    pub coefficient_of_variation: f64,
    pub trend_slope: f64,
}

impl SeriesStats {
    /// Compute all statistics for `data`. An empty series yields all zeros.
    pub fn compute(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self::default();
        }

        let n = data.len();
        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = data.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        // Population standard deviation (divisor n).
        let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std_deviation = variance.sqrt();

        let p95_idx = (0.95 * (n - 1) as f64) as usize;

        let lower = mean - 2.0 * std_deviation;
        let upper = mean + 2.0 * std_deviation;
        let outlier_count = data.iter().filter(|&&v| v < lower || v > upper).count();

        let coefficient_of_variation = if mean != 0.0 {
            std_deviation / mean.abs()
        } else {
            0.0
        };

        Self {
            mean,
            median,
            std_deviation,
            min: sorted[0],
            max: sorted[n - 1],
            percentile_95: sorted[p95_idx],
            outlier_count,
            coefficient_of_variation,
            trend_slope: trend_slope(data),
        }
    }
}

/// Ordinary-least-squares slope of `data` against its index 0..n-1.
/// Returns 0 for fewer than two points or a degenerate denominator.
fn trend_slope(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in data.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let n_f = n as f64;
    let denom = n_f * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denom
}
