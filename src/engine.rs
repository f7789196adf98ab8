//! Detection Engine - the per-sample orchestrator
//!
//! Ensures baselines exist, runs the detectors in fixed order, merges and
//! deduplicates their findings, and keeps running totals for observability.
//! A failing detector (or baseline build) is logged and contributes nothing;
//! a `process` call never aborts.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::anomaly::{Anomaly, AnomalyType};
use crate::baseline::{BaselineBuilder, BaselineCategory, BaselineStore, SampleStore};
use crate::config::CoreConfig;
use crate::detectors::{
    Detector, HeuristicDetector, ModelScorer, RuleBasedDetector, StatisticalDetector,
};
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

// ============================================================================
// ENGINE STATS
// ============================================================================

/// Running totals, maintained for observability only - nothing in the
/// detection path reads them back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub samples_processed: u64,
    pub anomalies_detected: u64,
    pub by_severity: BTreeMap<String, u64>,
    pub by_detector: BTreeMap<String, u64>,
}

// ============================================================================
// DETECTION ENGINE
// ============================================================================

pub struct DetectionEngine {
    builder: BaselineBuilder,
    detectors: Vec<Arc<dyn Detector>>,
    stats: Mutex<EngineStats>,
}

impl DetectionEngine {
    /// Detectors run in the order given - callers decide it once, here.
    pub fn new(builder: BaselineBuilder, detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self {
            builder,
            detectors,
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Standard assembly: rule-based, then statistical, then heuristic.
    pub fn with_default_detectors(
        config: CoreConfig,
        samples: Arc<dyn SampleStore>,
        baselines: Arc<dyn BaselineStore>,
        scorer: Arc<dyn ModelScorer>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let builder =
            BaselineBuilder::new(config.baseline.clone(), samples, baselines.clone())?;
        let detectors: Vec<Arc<dyn Detector>> = vec![
            Arc::new(RuleBasedDetector::new(config.detection.clone())?),
            Arc::new(StatisticalDetector::new(
                config.detection.clone(),
                baselines,
            )?),
            Arc::new(HeuristicDetector::new(config.detection, scorer)?),
        ];

        Ok(Self::new(builder, detectors))
    }

    /// Run the full detection cycle for one sample.
    pub fn process(&self, sample: &TelemetrySample) -> Vec<Anomaly> {
        // Lazy baseline upkeep. A failed build only degrades statistical
        // coverage for this cycle.
        for category in BaselineCategory::all() {
            if let Err(e) = self.builder.build(&sample.device_id, category, false) {
                log::warn!(
                    "baseline build {}/{category} failed: {e}",
                    sample.device_id
                );
            }
        }

        let mut collected = Vec::new();
        let mut per_detector: Vec<(&'static str, usize)> = Vec::new();

        for detector in &self.detectors {
            match detector.detect(sample) {
                Ok(found) => {
                    per_detector.push((detector.name(), found.len()));
                    collected.extend(found);
                }
                Err(e) => {
                    per_detector.push((detector.name(), 0));
                    log::warn!(
                        "detector '{}' failed on {}: {e}",
                        detector.name(),
                        sample.device_id
                    );
                }
            }
        }

        let merged = dedup(collected);

        let mut stats = self.stats.lock();
        stats.samples_processed += 1;
        stats.anomalies_detected += merged.len() as u64;
        for anomaly in &merged {
            *stats
                .by_severity
                .entry(anomaly.severity.as_str().to_string())
                .or_insert(0) += 1;
        }
        for (name, count) in per_detector {
            *stats.by_detector.entry(name.to_string()).or_insert(0) += count as u64;
        }
        drop(stats);

        if !merged.is_empty() {
            log::info!(
                "{}: {} anomalies after dedup",
                sample.device_id,
                merged.len()
            );
        }

        merged
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }
}

/// Collapse anomalies sharing a (type, feature) key to the single strongest
/// one - highest (severity rank, confidence, score), compared
/// lexicographically. Output is sorted strongest-first for stable results.
fn dedup(anomalies: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut groups: HashMap<(AnomalyType, String), Anomaly> = HashMap::new();

    for anomaly in anomalies {
        let key = (anomaly.anomaly_type, anomaly.feature.clone());
        match groups.entry(key) {
            Entry::Occupied(mut slot) => {
                if anomaly.outranks(slot.get()) {
                    slot.insert(anomaly);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(anomaly);
            }
        }
    }

    let mut merged: Vec<Anomaly> = groups.into_values().collect();
    merged.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.feature.cmp(&b.feature))
    });
    merged
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::anomaly::{DetectionMethod, Severity};
    use crate::baseline::{MemoryBaselineStore, MemorySampleStore};
    use crate::config::BaselineConfig;
    use crate::detectors::HeuristicModel;
    use crate::error::CoreError;
    use crate::telemetry::{
        AuthState, NetworkState, ProcessInfo, SecurityControls, SystemMetrics, TelemetrySample,
    };

    fn sample() -> TelemetrySample {
        TelemetrySample {
            device_id: "dev-1".to_string(),
            timestamp: Utc::now(),
            system: SystemMetrics {
                cpu_usage: 15.0,
                memory_usage: 40.0,
                disk_usage: 55.0,
                os_major_version: 15,
            },
            network: NetworkState {
                ssid: Some("office-wifi".to_string()),
                vpn_active: true,
                untrusted_network: false,
                connections: vec![],
            },
            processes: vec![ProcessInfo {
                name: "launchd".to_string(),
                pid: 1,
            }],
            security: SecurityControls {
                disk_encryption: true,
                firewall: true,
                app_gatekeeping: true,
                integrity_protection: true,
                screen_lock: true,
                password_required: true,
            },
            auth: AuthState {
                failed_auth_count: 0,
            },
        }
    }

    fn anomaly(severity: Severity, confidence: f64, score: f64) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            device_id: "dev-1".to_string(),
            anomaly_type: AnomalyType::Network,
            severity,
            method: DetectionMethod::Statistical,
            feature: "active_connections".to_string(),
            observed: String::new(),
            expected: String::new(),
            deviation: None,
            score,
            confidence,
            description: String::new(),
            recommendations: vec![],
            detected_at: Utc::now(),
        }
    }

    /// Emits a fixed anomaly list.
    struct StubDetector {
        emit: Vec<Anomaly>,
    }

    impl Detector for StubDetector {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn method(&self) -> DetectionMethod {
            DetectionMethod::RuleBased
        }

        fn detect(&self, _sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>> {
            Ok(self.emit.clone())
        }
    }

    /// Always errors.
    struct BrokenDetector;

    impl Detector for BrokenDetector {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn method(&self) -> DetectionMethod {
            DetectionMethod::Model
        }

        fn detect(&self, _sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>> {
            Err(CoreError::Detector {
                detector: "broken".to_string(),
                message: "synthetic failure".to_string(),
            })
        }
    }

    fn engine_with(detectors: Vec<Arc<dyn Detector>>) -> DetectionEngine {
        let builder = BaselineBuilder::new(
            BaselineConfig::default(),
            Arc::new(MemorySampleStore::new()),
            Arc::new(MemoryBaselineStore::new()),
        )
        .unwrap();
        DetectionEngine::new(builder, detectors)
    }

    #[test]
    fn test_dedup_keeps_strongest_per_key() {
        let medium = anomaly(Severity::Medium, 0.85, 60.0);
        let high = anomaly(Severity::High, 0.85, 70.0);
        let engine = engine_with(vec![
            Arc::new(StubDetector {
                emit: vec![medium],
            }),
            Arc::new(StubDetector { emit: vec![high] }),
        ]);

        let merged = engine.process(&sample());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].severity, Severity::High);
        assert_eq!(merged[0].score, 70.0);
    }

    #[test]
    fn test_distinct_keys_all_survive() {
        let mut other = anomaly(Severity::Low, 0.85, 40.0);
        other.feature = "vpn_active".to_string();
        let engine = engine_with(vec![Arc::new(StubDetector {
            emit: vec![anomaly(Severity::Medium, 0.85, 60.0), other],
        })]);

        let merged = engine.process(&sample());
        assert_eq!(merged.len(), 2);
        // Strongest first.
        assert_eq!(merged[0].severity, Severity::Medium);
    }

    #[test]
    fn test_broken_detector_never_aborts_processing() {
        let engine = engine_with(vec![
            Arc::new(BrokenDetector),
            Arc::new(StubDetector {
                emit: vec![anomaly(Severity::High, 0.95, 80.0)],
            }),
        ]);

        let merged = engine.process(&sample());
        assert_eq!(merged.len(), 1, "healthy detector output survives");
    }

    #[test]
    fn test_stats_track_processing() {
        let engine = engine_with(vec![Arc::new(StubDetector {
            emit: vec![anomaly(Severity::High, 0.95, 80.0)],
        })]);

        engine.process(&sample());
        engine.process(&sample());

        let stats = engine.stats();
        assert_eq!(stats.samples_processed, 2);
        assert_eq!(stats.anomalies_detected, 2);
        assert_eq!(stats.by_severity["high"], 2);
        assert_eq!(stats.by_detector["stub"], 2);
    }

    #[test]
    fn test_default_assembly_clean_sample() {
        let engine = DetectionEngine::with_default_detectors(
            CoreConfig::default(),
            Arc::new(MemorySampleStore::new()),
            Arc::new(MemoryBaselineStore::new()),
            Arc::new(HeuristicModel),
        )
        .unwrap();

        // No history, clean sample: no baselines get built, no rules fire,
        // the model stays under its emit threshold.
        let merged = engine.process(&sample());
        assert!(merged.is_empty());
        assert_eq!(engine.stats().samples_processed, 1);
    }

    #[test]
    fn test_end_to_end_baseline_then_detection() {
        let samples = Arc::new(MemorySampleStore::new());
        // 30 samples of steady history: cpu alternating 10/20 (mean 15,
        // stddev 5), everything else constant.
        for i in 0..30i64 {
            let mut s = sample();
            s.timestamp = Utc::now() - chrono::Duration::hours(i);
            s.system.cpu_usage = if i % 2 == 0 { 10.0 } else { 20.0 };
            samples.record(s);
        }

        let engine = DetectionEngine::with_default_detectors(
            CoreConfig::default(),
            samples,
            Arc::new(MemoryBaselineStore::new()),
            Arc::new(HeuristicModel),
        )
        .unwrap();

        // Deviant sample: cpu z = (95 - 15) / 5 = 16, plus two protection
        // tools disabled.
        let mut deviant = sample();
        deviant.system.cpu_usage = 95.0;
        deviant.security.disk_encryption = false;
        deviant.security.firewall = false;

        let merged = engine.process(&deviant);
        assert_eq!(merged.len(), 2);

        let cpu = merged
            .iter()
            .find(|a| a.feature == "cpu_usage")
            .expect("statistical cpu anomaly");
        assert_eq!(cpu.severity, Severity::Critical);
        assert_eq!(cpu.score, 100.0);

        let controls = merged
            .iter()
            .find(|a| a.feature == "security_controls")
            .expect("rule anomaly");
        assert_eq!(controls.score, 95.0);

        let stats = engine.stats();
        assert_eq!(stats.by_detector["statistical"], 1);
        assert_eq!(stats.by_detector["rule_based"], 1);
        assert_eq!(stats.by_detector["heuristic"], 0);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = CoreConfig::default();
        config.risk.weights.threat = 0.4; // sum > 1
        let result = DetectionEngine::with_default_detectors(
            config,
            Arc::new(MemorySampleStore::new()),
            Arc::new(MemoryBaselineStore::new()),
            Arc::new(HeuristicModel),
        );
        assert!(result.is_err());
    }
}
