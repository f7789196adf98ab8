//! Baseline data structures. No logic beyond freshness and the confidence
//! step function.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY & KEY
// ============================================================================

/// Baselines are learned independently per behavioral category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineCategory {
    Authentication,
    Network,
    Process,
    System,
}

impl BaselineCategory {
    pub fn all() -> [BaselineCategory; 4] {
        [
            BaselineCategory::Authentication,
            BaselineCategory::Network,
            BaselineCategory::Process,
            BaselineCategory::System,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineCategory::Authentication => "authentication",
            BaselineCategory::Network => "network",
            BaselineCategory::Process => "process",
            BaselineCategory::System => "system",
        }
    }
}

impl std::fmt::Display for BaselineCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store key: one baseline per (device, category).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    pub device_id: String,
    pub category: BaselineCategory,
}

impl BaselineKey {
    pub fn new(device_id: &str, category: BaselineCategory) -> Self {
        Self {
            device_id: device_id.to_string(),
            category,
        }
    }
}

// ============================================================================
// FEATURE STATISTICS
// ============================================================================

/// Summary statistics for one numeric feature. std_dev and percentiles are 0
/// when fewer than 2 samples backed the computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

// ============================================================================
// BASELINE
// ============================================================================

/// Learned "normal" for one (device, category). Created on first build,
/// replaced in place on rebuild, never deleted by this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub device_id: String,
    pub category: BaselineCategory,
    /// Learning window the samples were drawn from (days).
    pub window_days: i64,
    pub sample_count: usize,
    /// 0-100, step function of sample count.
    pub confidence: f64,
    pub numeric: BTreeMap<String, FeatureStats>,
    /// Per categorical feature: top-K value -> observation count. The tail
    /// beyond K is deliberately dropped.
    pub categorical: BTreeMap<String, BTreeMap<String, u64>>,
    /// Frequency-normalized hour-of-day histogram (sums to 1 when any
    /// samples were seen).
    pub hourly: [f64; 24],
    /// Frequency-normalized day-of-week histogram (Monday = 0).
    pub daily: [f64; 7],
    pub built_at: DateTime<Utc>,
}

impl Baseline {
    pub fn key(&self) -> BaselineKey {
        BaselineKey {
            device_id: self.device_id.clone(),
            category: self.category,
        }
    }

    /// Fresh baselines are reused as-is; stale ones are rebuilt.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.built_at) < max_age
    }

    pub fn numeric_stats(&self, feature: &str) -> Option<&FeatureStats> {
        self.numeric.get(feature)
    }

    pub fn known_values(&self, feature: &str) -> Option<&BTreeMap<String, u64>> {
        self.categorical.get(feature)
    }
}

/// Confidence step function of sample count: 0 below the build minimum, 50
/// below 50 samples, 75 below 100, then 75 + (n-100)/10 capped at 100.
pub fn confidence_for(sample_count: usize, min_samples: usize) -> f64 {
    if sample_count < min_samples {
        0.0
    } else if sample_count < 50 {
        50.0
    } else if sample_count < 100 {
        75.0
    } else {
        (75.0 + (sample_count as f64 - 100.0) / 10.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_step_function() {
        assert_eq!(confidence_for(0, 10), 0.0);
        assert_eq!(confidence_for(9, 10), 0.0);
        assert_eq!(confidence_for(10, 10), 50.0);
        assert_eq!(confidence_for(49, 10), 50.0);
        assert_eq!(confidence_for(50, 10), 75.0);
        assert_eq!(confidence_for(99, 10), 75.0);
        assert_eq!(confidence_for(100, 10), 75.0);
        assert_eq!(confidence_for(200, 10), 85.0);
        assert_eq!(confidence_for(1000, 10), 100.0);
    }

    #[test]
    fn test_freshness_window() {
        let mut baseline = Baseline {
            device_id: "dev-1".to_string(),
            category: BaselineCategory::System,
            window_days: 30,
            sample_count: 20,
            confidence: 50.0,
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
            hourly: [0.0; 24],
            daily: [0.0; 7],
            built_at: Utc::now(),
        };

        let now = baseline.built_at + Duration::hours(1);
        assert!(baseline.is_fresh(Duration::hours(24), now));

        baseline.built_at = now - Duration::hours(25);
        assert!(!baseline.is_fresh(Duration::hours(24), now));
    }
}
