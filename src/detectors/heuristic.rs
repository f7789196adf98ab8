//! Heuristic / Model Detector
//!
//! Scores a fixed feature vector with a pluggable model. The default
//! implementation is a hand-tuned weighted heuristic; a trained model can
//! replace it by implementing [`ModelScorer`] over the same feature map -
//! nothing else in the pipeline changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Timelike, Utc};
use uuid::Uuid;

use super::Detector;
use crate::anomaly::{Anomaly, AnomalyType, DetectionMethod, Severity};
use crate::config::DetectionConfig;
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

/// All model findings carry the same fixed confidence.
const MODEL_CONFIDENCE: f64 = 0.75;

// Feature map keys - the stable contract between extraction and scoring.
pub const F_CPU: &str = "cpu_usage";
pub const F_MEMORY: &str = "memory_usage";
pub const F_DISK: &str = "disk_usage";
pub const F_CONNECTIONS: &str = "active_connections";
pub const F_VPN: &str = "vpn_active";
pub const F_PROCESS_COUNT: &str = "process_count";
pub const F_DISK_ENCRYPTION: &str = "disk_encryption";
pub const F_FIREWALL: &str = "firewall";
pub const F_GATEKEEPING: &str = "app_gatekeeping";
pub const F_INTEGRITY: &str = "integrity_protection";
pub const F_FAILED_AUTH: &str = "failed_auth_count";
pub const F_HOUR: &str = "hour_of_day";
pub const F_DAY: &str = "day_of_week";

/// Flatten a sample into the fixed numeric feature map. Booleans become
/// 0.0 / 1.0.
pub fn extract_features(sample: &TelemetrySample) -> BTreeMap<String, f64> {
    let as_f = |b: bool| if b { 1.0 } else { 0.0 };

    let mut features = BTreeMap::new();
    features.insert(F_CPU.to_string(), sample.system.cpu_usage);
    features.insert(F_MEMORY.to_string(), sample.system.memory_usage);
    features.insert(F_DISK.to_string(), sample.system.disk_usage);
    features.insert(
        F_CONNECTIONS.to_string(),
        sample.network.connection_count() as f64,
    );
    features.insert(F_VPN.to_string(), as_f(sample.network.vpn_active));
    features.insert(F_PROCESS_COUNT.to_string(), sample.processes.len() as f64);
    features.insert(
        F_DISK_ENCRYPTION.to_string(),
        as_f(sample.security.disk_encryption),
    );
    features.insert(F_FIREWALL.to_string(), as_f(sample.security.firewall));
    features.insert(
        F_GATEKEEPING.to_string(),
        as_f(sample.security.app_gatekeeping),
    );
    features.insert(
        F_INTEGRITY.to_string(),
        as_f(sample.security.integrity_protection),
    );
    features.insert(
        F_FAILED_AUTH.to_string(),
        sample.auth.failed_auth_count as f64,
    );
    features.insert(F_HOUR.to_string(), sample.timestamp.hour() as f64);
    features.insert(
        F_DAY.to_string(),
        sample.timestamp.weekday().num_days_from_monday() as f64,
    );
    features
}

/// Strategy seam for the anomaly-likelihood model. Implementations must be
/// deterministic and side-effect-free over the fixed feature set.
pub trait ModelScorer: Send + Sync {
    /// Anomaly likelihood in [0, 1].
    fn score(&self, features: &BTreeMap<String, f64>) -> f64;

    fn name(&self) -> &'static str {
        "model"
    }
}

/// Default scorer: a weighted sum of normalized risk signals. Weights sum to
/// 1.0, so the output is naturally bounded to [0, 1].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicModel;

impl HeuristicModel {
    fn feature(features: &BTreeMap<String, f64>, key: &str) -> f64 {
        features.get(key).copied().unwrap_or(0.0)
    }
}

impl ModelScorer for HeuristicModel {
    fn score(&self, features: &BTreeMap<String, f64>) -> f64 {
        let f = |key| Self::feature(features, key);

        let cpu = (f(F_CPU) / 100.0).clamp(0.0, 1.0);
        let memory = (f(F_MEMORY) / 100.0).clamp(0.0, 1.0);
        let disk = (f(F_DISK) / 100.0).clamp(0.0, 1.0);
        let connections = (f(F_CONNECTIONS) / 200.0).clamp(0.0, 1.0);
        let no_vpn = 1.0 - f(F_VPN).clamp(0.0, 1.0);
        let processes = (f(F_PROCESS_COUNT) / 400.0).clamp(0.0, 1.0);
        let disabled_controls = (4.0
            - (f(F_DISK_ENCRYPTION) + f(F_FIREWALL) + f(F_GATEKEEPING) + f(F_INTEGRITY)))
            / 4.0;
        let failed_auth = (f(F_FAILED_AUTH) / 20.0).clamp(0.0, 1.0);
        let hour = f(F_HOUR);
        let off_hours = if !(7.0..=22.0).contains(&hour) { 1.0 } else { 0.0 };

        let score = cpu * 0.10
            + memory * 0.10
            + disk * 0.05
            + connections * 0.15
            + no_vpn * 0.05
            + processes * 0.10
            + disabled_controls * 0.25
            + failed_auth * 0.15
            + off_hours * 0.05;

        score.clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

pub struct HeuristicDetector {
    config: DetectionConfig,
    scorer: Arc<dyn ModelScorer>,
}

impl HeuristicDetector {
    pub fn new(config: DetectionConfig, scorer: Arc<dyn ModelScorer>) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config, scorer })
    }

    /// Band the model score into a severity.
    fn severity_for_score(score: f64) -> Severity {
        if score >= 0.9 {
            Severity::Critical
        } else if score >= 0.8 {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

impl Detector for HeuristicDetector {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Model
    }

    fn detect(&self, sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>> {
        let features = extract_features(sample);
        let score = self.scorer.score(&features).clamp(0.0, 1.0);

        if score <= self.config.heuristic_emit_threshold {
            return Ok(vec![]);
        }

        log::debug!(
            "model '{}' scored {} at {score:.3}",
            self.scorer.name(),
            sample.device_id
        );

        Ok(vec![Anomaly {
            id: Uuid::new_v4(),
            device_id: sample.device_id.clone(),
            anomaly_type: AnomalyType::UserBehavior,
            severity: Self::severity_for_score(score),
            method: DetectionMethod::Model,
            feature: "model_score".to_string(),
            observed: format!("{score:.3}"),
            expected: format!("at most {:.2}", self.config.heuristic_emit_threshold),
            deviation: None,
            score: score * 100.0,
            confidence: MODEL_CONFIDENCE,
            description: format!(
                "Behavioral model '{}' rates this sample {score:.2} anomalous",
                self.scorer.name()
            ),
            recommendations: vec![
                "Correlate with rule-based and statistical findings".to_string(),
            ],
            detected_at: Utc::now(),
        }])
    }
}

// ============================================================================
// TESTS
// ============================================================================
