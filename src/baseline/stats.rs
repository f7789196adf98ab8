//! Descriptive statistics for baseline building. Population variants
//! throughout; everything degrades to 0 rather than dividing by small n.

use super::types::FeatureStats;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. 0 when fewer than 2 samples.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile over an ascending-sorted slice:
/// index = round((n - 1) * q).
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Full summary for one feature's observed values.
pub fn summarize(values: &[f64]) -> FeatureStats {
    if values.is_empty() {
        return FeatureStats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mut stats = FeatureStats {
        mean: mean(&sorted),
        std_dev: std_dev(&sorted),
        min: sorted[0],
        max: sorted[n - 1],
        ..FeatureStats::default()
    };

    // Percentiles are meaningless on a single observation; leave them 0 to
    // match the std_dev rule.
    if n >= 2 {
        stats.p25 = percentile(&sorted, 0.25);
        stats.p50 = percentile(&sorted, 0.50);
        stats.p75 = percentile(&sorted, 0.75);
        stats.p95 = percentile(&sorted, 0.95);
        stats.p99 = percentile(&sorted, 0.99);
    }

    stats
}
