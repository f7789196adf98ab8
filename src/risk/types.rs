//! Risk assessment output types. Data only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anomaly::Severity;
use crate::config::RiskWeights;

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Ordered classification of a total risk score against configured cut
/// points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// COMPONENTS & FACTORS
// ============================================================================

/// The four dimension scores, each 0-100, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub security_posture: f64,
    pub compliance: f64,
    pub behavioral: f64,
    pub threat: f64,
}

/// One concrete contributor to the risk picture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    /// Dimension or, for compliance violations, the violation's own
    /// category carried through verbatim.
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub remediation: Option<String>,
    pub automatable: bool,
}

/// Prioritized remediation step derived from the factor list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub severity: Severity,
    pub automatable: bool,
}

// ============================================================================
// ASSESSMENT
// ============================================================================

/// One full risk assessment. Created fresh per call and never updated in
/// place - every assessment is a new historical row for the consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub device_id: String,
    pub assessed_at: DateTime<Utc>,
    pub component_scores: ComponentScores,
    /// The weights this assessment was computed with.
    pub weights: RiskWeights,
    pub total_score: f64,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub recommendations: Vec<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }
}
