//! Anomaly Types
//!
//! Core detection output types. No logic here beyond ordering helpers -
//! detectors create anomalies, the engine deduplicates them, nothing ever
//! mutates one after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SEVERITY
// ============================================================================

/// Severity levels, totally ordered: Info < Low < Medium < High < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric rank used for deduplication and threshold comparisons.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ANOMALY TYPE & DETECTION METHOD
// ============================================================================

/// What part of the endpoint the anomaly concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Authentication,
    Network,
    Process,
    FileSystem,
    SystemConfig,
    Software,
    UserBehavior,
    SecurityEvent,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Authentication => "authentication",
            AnomalyType::Network => "network",
            AnomalyType::Process => "process",
            AnomalyType::FileSystem => "file_system",
            AnomalyType::SystemConfig => "system_config",
            AnomalyType::Software => "software",
            AnomalyType::UserBehavior => "user_behavior",
            AnomalyType::SecurityEvent => "security_event",
        }
    }
}

/// Which detector produced the anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Statistical,
    RuleBased,
    Model,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Statistical => "statistical",
            DetectionMethod::RuleBased => "rule_based",
            DetectionMethod::Model => "model",
        }
    }
}

// ============================================================================
// ANOMALY
// ============================================================================

/// One detected deviation. Created by exactly one detector; the engine
/// discards duplicates by (type, feature) and never mutates survivors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Uuid,
    pub device_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub method: DetectionMethod,
    /// Feature the detection fired on; half of the dedup key.
    pub feature: String,
    pub observed: String,
    pub expected: String,
    /// Deviation magnitude (z-score for statistical findings). None for
    /// fixed-score checks.
    pub deviation: Option<f64>,
    /// 0-100.
    pub score: f64,
    /// 0-1, fixed per detection method.
    pub confidence: f64,
    pub description: String,
    pub recommendations: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl Anomaly {
    /// Dedup key: anomalies sharing (type, feature) describe the same
    /// observation and collapse to the strongest one.
    pub fn dedup_key(&self) -> (AnomalyType, &str) {
        (self.anomaly_type, self.feature.as_str())
    }

    /// Lexicographic (severity rank, confidence, score) comparison used by
    /// the engine to pick the survivor within a dedup group.
    pub fn outranks(&self, other: &Anomaly) -> bool {
        let lhs = (self.severity.rank(), self.confidence, self.score);
        let rhs = (other.severity.rank(), other.confidence, other.score);
        lhs > rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::Critical.rank(), 4);
    }

    fn anomaly(severity: Severity, confidence: f64, score: f64) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            device_id: "dev-1".to_string(),
            anomaly_type: AnomalyType::Network,
            severity,
            method: DetectionMethod::Statistical,
            feature: "active_connections".to_string(),
            observed: "120".to_string(),
            expected: "40".to_string(),
            deviation: None,
            score,
            confidence,
            description: String::new(),
            recommendations: vec![],
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_outranks_severity_first() {
        let high = anomaly(Severity::High, 0.85, 70.0);
        let medium = anomaly(Severity::Medium, 0.95, 99.0);
        assert!(high.outranks(&medium));
        assert!(!medium.outranks(&high));
    }

    #[test]
    fn test_outranks_confidence_breaks_ties() {
        let a = anomaly(Severity::High, 0.95, 60.0);
        let b = anomaly(Severity::High, 0.85, 90.0);
        assert!(a.outranks(&b));
    }

    #[test]
    fn test_outranks_score_last() {
        let a = anomaly(Severity::High, 0.85, 70.0);
        let b = anomaly(Severity::High, 0.85, 60.0);
        assert!(a.outranks(&b));
        assert!(!a.outranks(&a.clone()));
    }
}
