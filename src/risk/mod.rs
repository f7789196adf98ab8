//! Risk Assessor
//!
//! Folds one telemetry sample plus optional compliance results, recent
//! security events and recent history into a single 0-100 score across four
//! weighted dimensions, then classifies it against the configured cut
//! points. The whole pass is deterministic: no randomness, one timestamp.
//!
//! Missing inputs are policy, not errors: no compliance result scores a
//! neutral 50, no history scores behavioral 0.

pub mod types;

use chrono::Utc;
use uuid::Uuid;

use crate::anomaly::Severity;
use crate::config::RiskConfig;
use crate::detectors::rules::{is_malicious_process_name, SUSPICIOUS_PORTS};
use crate::error::CoreResult;
use crate::telemetry::{ComplianceResult, SecurityEvent, TelemetrySample};

pub use types::{ComponentScores, Recommendation, RiskAssessment, RiskFactor, RiskLevel};

// Behavioral scoring increments and caps.
const SUSPICIOUS_CONNECTION_POINTS: f64 = 5.0;
const SUSPICIOUS_CONNECTION_CAP: f64 = 30.0;
const SUSPICIOUS_PROCESS_POINTS: f64 = 10.0;
const SUSPICIOUS_PROCESS_CAP: f64 = 40.0;

/// Most recommendations surfaced from High factors.
const MAX_HIGH_RECOMMENDATIONS: usize = 5;

pub struct RiskAssessor {
    config: RiskConfig,
}

impl RiskAssessor {
    pub fn new(config: RiskConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Compute a fresh assessment. Never mutates prior results - each call
    /// produces a new historical row.
    pub fn assess(
        &self,
        sample: &TelemetrySample,
        compliance: Option<&ComplianceResult>,
        events: &[SecurityEvent],
        history: &[TelemetrySample],
    ) -> RiskAssessment {
        let now = Utc::now();
        let mut factors = Vec::new();

        let component_scores = ComponentScores {
            security_posture: self.score_security_posture(sample, &mut factors),
            compliance: self.score_compliance(compliance, &mut factors),
            behavioral: self.score_behavioral(history, &mut factors),
            threat: self.score_threat(events, &mut factors),
        };

        let total_score = self.weighted_total(&component_scores);
        let level = self.classify(total_score);
        let recommendations = self.recommendations(&factors);

        log::info!(
            "risk assessment for {}: total {total_score:.1} ({level})",
            sample.device_id
        );

        RiskAssessment {
            id: Uuid::new_v4(),
            device_id: sample.device_id.clone(),
            assessed_at: now,
            component_scores,
            weights: self.config.weights,
            total_score,
            level,
            factors,
            recommendations,
        }
    }

    /// Weighted combination. Weights were validated to sum to 1.0 at
    /// construction; they are never renormalized here.
    pub fn weighted_total(&self, scores: &ComponentScores) -> f64 {
        let w = &self.config.weights;
        scores.security_posture * w.security_posture
            + scores.compliance * w.compliance
            + scores.behavioral * w.behavioral
            + scores.threat * w.threat
    }

    /// Classify a total score against the configured cut points.
    pub fn classify(&self, total: f64) -> RiskLevel {
        let t = &self.config.thresholds;
        if total >= t.critical {
            RiskLevel::Critical
        } else if total >= t.high {
            RiskLevel::High
        } else if total >= t.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    // ------------------------------------------------------------------
    // Dimension 1: security posture (averaged sub-parts, each capped)
    // ------------------------------------------------------------------

    fn score_security_posture(
        &self,
        sample: &TelemetrySample,
        factors: &mut Vec<RiskFactor>,
    ) -> f64 {
        // Part 1: OS version gap, 25 points per major version behind.
        let versions_behind = self
            .config
            .latest_os_major_version
            .saturating_sub(sample.system.os_major_version);
        let os_score = (versions_behind as f64 * 25.0).min(100.0);
        if versions_behind > 0 {
            factors.push(RiskFactor {
                name: "outdated_os".to_string(),
                category: "security_posture".to_string(),
                severity: if versions_behind >= 2 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                description: format!(
                    "Operating system {} major versions behind",
                    versions_behind
                ),
                remediation: Some("Update to the latest operating system version".to_string()),
                automatable: true,
            });
        }

        // Part 2: disabled protection tools.
        let mut tools_score: f64 = 0.0;
        let security = &sample.security;
        if !security.disk_encryption {
            tools_score += 40.0;
            factors.push(RiskFactor {
                name: "disk_encryption_disabled".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::Critical,
                description: "Disk encryption is disabled".to_string(),
                remediation: Some("Enable full-disk encryption".to_string()),
                automatable: true,
            });
        }
        if !security.firewall {
            tools_score += 25.0;
            factors.push(RiskFactor {
                name: "firewall_disabled".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::High,
                description: "Firewall is disabled".to_string(),
                remediation: Some("Enable the system firewall".to_string()),
                automatable: true,
            });
        }
        if !security.app_gatekeeping {
            tools_score += 15.0;
            factors.push(RiskFactor {
                name: "app_gatekeeping_disabled".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::Medium,
                description: "Application gatekeeping is disabled".to_string(),
                remediation: Some("Re-enable application gatekeeping".to_string()),
                automatable: true,
            });
        }
        if !security.integrity_protection {
            tools_score += 40.0;
            factors.push(RiskFactor {
                name: "integrity_protection_disabled".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::Critical,
                description: "System integrity protection is disabled".to_string(),
                remediation: Some("Re-enable system integrity protection".to_string()),
                automatable: false,
            });
        }
        let tools_score = tools_score.min(100.0);

        // Part 3: authentication gaps.
        let mut auth_score: f64 = 0.0;
        if !security.screen_lock {
            auth_score += 20.0;
            factors.push(RiskFactor {
                name: "no_screen_lock".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::Medium,
                description: "No screen lock configured".to_string(),
                remediation: Some("Require a screen lock".to_string()),
                automatable: true,
            });
        }
        if !security.password_required {
            auth_score += 30.0;
            factors.push(RiskFactor {
                name: "no_password".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::High,
                description: "No login password required".to_string(),
                remediation: Some("Require a login password".to_string()),
                automatable: true,
            });
        }
        let auth_score = auth_score.min(100.0);

        // Part 4: network exposure.
        let mut network_score = 0.0;
        if sample.network.untrusted_network && !sample.network.vpn_active {
            network_score += 10.0;
            factors.push(RiskFactor {
                name: "exposed_network".to_string(),
                category: "security_posture".to_string(),
                severity: Severity::Medium,
                description: "On an untrusted network without VPN".to_string(),
                remediation: Some("Connect through the VPN on untrusted networks".to_string()),
                automatable: false,
            });
        }

        // The four parts are averaged, never summed.
        (os_score + tools_score + auth_score + network_score) / 4.0
    }

    // ------------------------------------------------------------------
    // Dimension 2: compliance
    // ------------------------------------------------------------------

    fn score_compliance(
        &self,
        compliance: Option<&ComplianceResult>,
        factors: &mut Vec<RiskFactor>,
    ) -> f64 {
        let Some(result) = compliance else {
            // Absence of data is never "compliant" - fixed neutral score.
            factors.push(RiskFactor {
                name: "compliance_unknown".to_string(),
                category: "compliance".to_string(),
                severity: Severity::Medium,
                description: "No compliance result available for this device".to_string(),
                remediation: Some("Run a compliance evaluation".to_string()),
                automatable: true,
            });
            return 50.0;
        };

        for violation in &result.violations {
            factors.push(RiskFactor {
                name: violation.name.clone(),
                category: violation.category.clone(),
                severity: violation.severity,
                description: violation.description.clone(),
                remediation: Some(violation.remediation.clone()),
                automatable: false,
            });
        }

        if result.is_compliant {
            0.0
        } else {
            (100.0 - result.compliance_score).clamp(0.0, 100.0)
        }
    }

    // ------------------------------------------------------------------
    // Dimension 3: behavioral
    // ------------------------------------------------------------------

    fn score_behavioral(
        &self,
        history: &[TelemetrySample],
        factors: &mut Vec<RiskFactor>,
    ) -> f64 {
        // No history means no behavioral opinion - mirrors the "skip if no
        // baseline" policy. A brand-new device scores 0 here.
        if history.is_empty() {
            return 0.0;
        }

        let suspicious_connections = history
            .iter()
            .flat_map(|s| s.network.connections.iter())
            .filter(|c| SUSPICIOUS_PORTS.contains(&c.remote_port))
            .count();

        let suspicious_processes: std::collections::HashSet<&str> = history
            .iter()
            .flat_map(|s| s.processes.iter())
            .map(|p| p.name.as_str())
            .filter(|name| is_malicious_process_name(name))
            .collect();

        let connection_score = (suspicious_connections as f64 * SUSPICIOUS_CONNECTION_POINTS)
            .min(SUSPICIOUS_CONNECTION_CAP);
        let process_score = (suspicious_processes.len() as f64 * SUSPICIOUS_PROCESS_POINTS)
            .min(SUSPICIOUS_PROCESS_CAP);

        if suspicious_connections > 0 {
            factors.push(RiskFactor {
                name: "suspicious_connections".to_string(),
                category: "behavioral".to_string(),
                severity: Severity::Medium,
                description: format!(
                    "{suspicious_connections} connections to suspicious ports in recent history"
                ),
                remediation: Some("Audit outbound connections on flagged ports".to_string()),
                automatable: false,
            });
        }
        if !suspicious_processes.is_empty() {
            factors.push(RiskFactor {
                name: "suspicious_processes".to_string(),
                category: "behavioral".to_string(),
                severity: Severity::High,
                description: format!(
                    "{} suspicious process names in recent history",
                    suspicious_processes.len()
                ),
                remediation: Some("Quarantine the flagged processes".to_string()),
                automatable: true,
            });
        }

        connection_score + process_score
    }

    // ------------------------------------------------------------------
    // Dimension 4: threat indicators
    // ------------------------------------------------------------------

    fn score_threat(&self, events: &[SecurityEvent], factors: &mut Vec<RiskFactor>) -> f64 {
        let mut score: f64 = 0.0;
        for event in events {
            let weight = match event.severity {
                Severity::Critical => 40.0,
                Severity::High => 25.0,
                Severity::Medium => 15.0,
                Severity::Low => 5.0,
                Severity::Info => 0.0,
            };
            if weight == 0.0 {
                continue;
            }
            score += weight;
            factors.push(RiskFactor {
                name: event.title.clone(),
                category: event.category.clone(),
                severity: event.severity,
                description: event.description.clone(),
                remediation: None,
                automatable: false,
            });
        }
        score.min(100.0)
    }

    // ------------------------------------------------------------------
    // Recommendations
    // ------------------------------------------------------------------

    /// One recommendation per Critical factor, then up to five more drawn
    /// from High factors, in factor order.
    fn recommendations(&self, factors: &[RiskFactor]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for factor in factors.iter().filter(|f| f.severity == Severity::Critical) {
            recommendations.push(Self::recommendation_for(factor));
        }

        for factor in factors
            .iter()
            .filter(|f| f.severity == Severity::High)
            .take(MAX_HIGH_RECOMMENDATIONS)
        {
            recommendations.push(Self::recommendation_for(factor));
        }

        recommendations
    }

    fn recommendation_for(factor: &RiskFactor) -> Recommendation {
        Recommendation {
            action: factor
                .remediation
                .clone()
                .unwrap_or_else(|| format!("Review risk factor '{}'", factor.name)),
            severity: factor.severity,
            automatable: factor.automatable,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
