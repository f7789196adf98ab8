//! Configuration
//!
//! All tunables live here and are passed into components at construction -
//! no globals. Invariants (weight sum, threshold ordering) are validated
//! once, up front, and violations are fatal. Call-time code can rely on a
//! validated config.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// ============================================================================
// DEFAULTS (Constants)
// ============================================================================

/// Learning window for baseline building (days).
pub const DEFAULT_LEARNING_WINDOW_DAYS: i64 = 30;

/// Minimum samples before a baseline is considered buildable.
pub const DEFAULT_MIN_SAMPLES: usize = 10;

/// A baseline older than this is stale and rebuilt on demand (hours).
pub const DEFAULT_BASELINE_MAX_AGE_HOURS: i64 = 24;

/// Top-K retained for network (SSID) frequency maps.
pub const DEFAULT_TOP_NETWORKS: usize = 10;

/// Top-K retained for process-name frequency maps.
pub const DEFAULT_TOP_PROCESSES: usize = 20;

/// |z| above this flags a statistical anomaly.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Hour-of-day historical frequency below this is "rare".
pub const DEFAULT_RARE_HOUR_FREQUENCY: f64 = 0.01;

/// Model score above this emits a heuristic anomaly.
pub const DEFAULT_HEURISTIC_EMIT_THRESHOLD: f64 = 0.7;

// ============================================================================
// BASELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub learning_window_days: i64,
    pub min_samples: usize,
    pub max_age_hours: i64,
    pub top_networks: usize,
    pub top_processes: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            learning_window_days: DEFAULT_LEARNING_WINDOW_DAYS,
            min_samples: DEFAULT_MIN_SAMPLES,
            max_age_hours: DEFAULT_BASELINE_MAX_AGE_HOURS,
            top_networks: DEFAULT_TOP_NETWORKS,
            top_processes: DEFAULT_TOP_PROCESSES,
        }
    }
}

impl BaselineConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.learning_window_days <= 0 {
            return Err(CoreError::InvalidConfig(
                "learning_window_days must be positive".to_string(),
            ));
        }
        if self.min_samples < 2 {
            return Err(CoreError::InvalidConfig(
                "min_samples must be at least 2".to_string(),
            ));
        }
        if self.max_age_hours <= 0 {
            return Err(CoreError::InvalidConfig(
                "max_age_hours must be positive".to_string(),
            ));
        }
        if self.top_networks == 0 || self.top_processes == 0 {
            return Err(CoreError::InvalidConfig(
                "top-K limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// DETECTION CONFIG
// ============================================================================

/// Fixed thresholds for the rule-based detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Failed auth attempts at or above this trigger the brute-force rule.
    pub max_failed_auth: u32,
    /// Connection count above this triggers the network-exposure rule.
    pub max_connections: usize,
    /// Disk usage (percent) above this triggers the disk-pressure rule.
    pub max_disk_usage: f64,
    /// Disabled protection tools at or above this trigger the critical
    /// controls rule.
    pub min_disabled_controls: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            max_failed_auth: 10,
            max_connections: 100,
            max_disk_usage: 95.0,
            min_disabled_controls: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub z_threshold: f64,
    pub rare_hour_frequency: f64,
    /// Distinct unknown process names above this (with an established
    /// baseline) flag an anomaly.
    pub unknown_process_limit: usize,
    /// Baseline must know at least this many process names before the
    /// unknown-process check applies.
    pub known_process_min: usize,
    pub heuristic_emit_threshold: f64,
    pub rules: RuleThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            rare_hour_frequency: DEFAULT_RARE_HOUR_FREQUENCY,
            unknown_process_limit: 3,
            known_process_min: 5,
            heuristic_emit_threshold: DEFAULT_HEURISTIC_EMIT_THRESHOLD,
            rules: RuleThresholds::default(),
        }
    }
}

impl DetectionConfig {
    /// High sensitivity - lower thresholds, more alerts.
    pub fn high_sensitivity() -> Self {
        Self {
            z_threshold: 2.5,
            heuristic_emit_threshold: 0.6,
            ..Default::default()
        }
    }

    /// Low sensitivity - higher thresholds, fewer alerts.
    pub fn low_sensitivity() -> Self {
        Self {
            z_threshold: 3.5,
            heuristic_emit_threshold: 0.8,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.z_threshold <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "z_threshold must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.rare_hour_frequency) {
            return Err(CoreError::InvalidConfig(
                "rare_hour_frequency must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.heuristic_emit_threshold) {
            return Err(CoreError::InvalidConfig(
                "heuristic_emit_threshold must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RISK CONFIG
// ============================================================================

/// Weights of the four risk dimensions. Must sum to 1.0 - the assessor
/// validates once at construction and never renormalizes at call time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    pub security_posture: f64,
    pub compliance: f64,
    pub behavioral: f64,
    pub threat: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            security_posture: 0.4,
            compliance: 0.3,
            behavioral: 0.2,
            threat: 0.1,
        }
    }
}

impl RiskWeights {
    pub fn sum(&self) -> f64 {
        self.security_posture + self.compliance + self.behavioral + self.threat
    }
}

/// Ordered cut points for risk level classification. Must be strictly
/// descending: critical > high > medium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: 90.0,
            high: 75.0,
            medium: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    /// Latest shipped OS major version, for the posture version-gap check.
    pub latest_os_major_version: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            latest_os_major_version: 15,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> CoreResult<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::InvalidConfig(format!(
                "risk weights must sum to 1.0, got {sum}"
            )));
        }
        let t = &self.thresholds;
        if !(t.critical > t.high && t.high > t.medium) {
            return Err(CoreError::InvalidConfig(format!(
                "risk thresholds must be strictly descending, got critical={} high={} medium={}",
                t.critical, t.high, t.medium
            )));
        }
        if t.medium <= 0.0 || t.critical > 100.0 {
            return Err(CoreError::InvalidConfig(
                "risk thresholds must lie in (0, 100]".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub baseline: BaselineConfig,
    pub detection: DetectionConfig,
    pub risk: RiskConfig,
}

impl CoreConfig {
    pub fn validate(&self) -> CoreResult<()> {
        self.baseline.validate()?;
        self.detection.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
