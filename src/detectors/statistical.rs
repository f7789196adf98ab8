//! Statistical Detector
//!
//! Compares a sample against the device's learned baselines using z-score
//! deviation tests plus a few fixed-score frequency checks. No baseline for
//! a device means no output - deterministically empty, never an error.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Timelike, Utc};
use uuid::Uuid;

use super::Detector;
use crate::anomaly::{Anomaly, AnomalyType, DetectionMethod, Severity};
use crate::baseline::{
    Baseline, BaselineStore, FeatureStats, FEAT_CONNECTIONS, FEAT_CPU, FEAT_FAILED_AUTH,
    FEAT_MEMORY, FEAT_PROCESS_COUNT, FEAT_PROCESS_NAME, FEAT_SSID, FEAT_VPN_RATE,
};
use crate::baseline::BaselineCategory;
use crate::config::DetectionConfig;
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

/// All statistical findings carry the same fixed confidence.
const STATISTICAL_CONFIDENCE: f64 = 0.85;

pub struct StatisticalDetector {
    config: DetectionConfig,
    baselines: Arc<dyn BaselineStore>,
}

impl StatisticalDetector {
    pub fn new(config: DetectionConfig, baselines: Arc<dyn BaselineStore>) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config, baselines })
    }

    /// Severity ladder over |z|.
    fn severity_for_z(z_abs: f64) -> Severity {
        if z_abs >= 6.0 {
            Severity::Critical
        } else if z_abs >= 4.5 {
            Severity::High
        } else if z_abs >= 3.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Shared deviation test. Guards sigma > 0; one-sided checks only fire
    /// above the mean.
    fn deviation_anomaly(
        &self,
        sample: &TelemetrySample,
        stats: &FeatureStats,
        anomaly_type: AnomalyType,
        feature: &str,
        observed: f64,
        one_sided: bool,
    ) -> Option<Anomaly> {
        if stats.std_dev <= 0.0 {
            return None;
        }
        let z = (observed - stats.mean) / stats.std_dev;
        let triggered = if one_sided {
            z > self.config.z_threshold
        } else {
            z.abs() > self.config.z_threshold
        };
        if !triggered {
            return None;
        }

        let magnitude = z.abs();
        Some(Anomaly {
            id: Uuid::new_v4(),
            device_id: sample.device_id.clone(),
            anomaly_type,
            severity: Self::severity_for_z(magnitude),
            method: DetectionMethod::Statistical,
            feature: feature.to_string(),
            observed: format!("{observed:.1}"),
            expected: format!("{:.1} \u{00b1} {:.1}", stats.mean, stats.std_dev),
            deviation: Some(magnitude),
            score: (magnitude * 20.0).min(100.0),
            confidence: STATISTICAL_CONFIDENCE,
            description: format!(
                "{feature} deviates {magnitude:.1} standard deviations from baseline"
            ),
            recommendations: vec![format!("Investigate the spike in {feature} on this device")],
            detected_at: Utc::now(),
        })
    }

    fn fixed_anomaly(
        &self,
        sample: &TelemetrySample,
        anomaly_type: AnomalyType,
        severity: Severity,
        feature: &str,
        observed: String,
        expected: String,
        score: f64,
        description: String,
        recommendation: String,
    ) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            device_id: sample.device_id.clone(),
            anomaly_type,
            severity,
            method: DetectionMethod::Statistical,
            feature: feature.to_string(),
            observed,
            expected,
            deviation: None,
            score,
            confidence: STATISTICAL_CONFIDENCE,
            description,
            recommendations: vec![recommendation],
            detected_at: Utc::now(),
        }
    }

    fn detect_authentication(
        &self,
        sample: &TelemetrySample,
        baseline: &Baseline,
        out: &mut Vec<Anomaly>,
    ) {
        if let Some(stats) = baseline.numeric_stats(FEAT_FAILED_AUTH) {
            if let Some(anomaly) = self.deviation_anomaly(
                sample,
                stats,
                AnomalyType::Authentication,
                FEAT_FAILED_AUTH,
                sample.auth.failed_auth_count as f64,
                false,
            ) {
                out.push(anomaly);
            }
        }

        // Hour rarity is independent of any z-score: activity in an hour the
        // device historically almost never reports is itself a signal.
        let hour = sample.timestamp.hour() as usize;
        if baseline.hourly[hour] < self.config.rare_hour_frequency {
            out.push(self.fixed_anomaly(
                sample,
                AnomalyType::Authentication,
                Severity::Low,
                "active_hour",
                format!("{hour:02}:00"),
                "historically active hours".to_string(),
                50.0,
                format!("Activity at {hour:02}:00, an hour this device is rarely active in"),
                "Confirm the activity was initiated by the device owner".to_string(),
            ));
        }
    }

    fn detect_network(
        &self,
        sample: &TelemetrySample,
        baseline: &Baseline,
        out: &mut Vec<Anomaly>,
    ) {
        if let Some(stats) = baseline.numeric_stats(FEAT_CONNECTIONS) {
            if let Some(anomaly) = self.deviation_anomaly(
                sample,
                stats,
                AnomalyType::Network,
                FEAT_CONNECTIONS,
                sample.network.connection_count() as f64,
                false,
            ) {
                out.push(anomaly);
            }
        }

        if let Some(ssid) = &sample.network.ssid {
            if let Some(known) = baseline.known_values(FEAT_SSID) {
                if !known.is_empty() && !known.contains_key(ssid) {
                    out.push(self.fixed_anomaly(
                        sample,
                        AnomalyType::Network,
                        Severity::Medium,
                        FEAT_SSID,
                        ssid.clone(),
                        format!("one of {} known networks", known.len()),
                        60.0,
                        format!("Connected to unfamiliar network '{ssid}'"),
                        "Verify the network is legitimate and trusted".to_string(),
                    ));
                }
            }
        }

        // VPN habit check: only meaningful when the historical usage rate is
        // decisive (outside [0.2, 0.8]).
        if let Some(stats) = baseline.numeric_stats(FEAT_VPN_RATE) {
            let rate = stats.mean;
            if !(0.2..=0.8).contains(&rate) {
                let habitually_on = rate > 0.8;
                if sample.network.vpn_active != habitually_on {
                    out.push(self.fixed_anomaly(
                        sample,
                        AnomalyType::Network,
                        Severity::Low,
                        "vpn_active",
                        sample.network.vpn_active.to_string(),
                        format!("vpn usage rate {rate:.2}"),
                        40.0,
                        "VPN state contradicts this device's usage pattern".to_string(),
                        "Check whether the VPN configuration changed".to_string(),
                    ));
                }
            }
        }
    }

    fn detect_process(
        &self,
        sample: &TelemetrySample,
        baseline: &Baseline,
        out: &mut Vec<Anomaly>,
    ) {
        if let Some(stats) = baseline.numeric_stats(FEAT_PROCESS_COUNT) {
            if let Some(anomaly) = self.deviation_anomaly(
                sample,
                stats,
                AnomalyType::Process,
                FEAT_PROCESS_COUNT,
                sample.processes.len() as f64,
                false,
            ) {
                out.push(anomaly);
            }
        }

        if let Some(known) = baseline.known_values(FEAT_PROCESS_NAME) {
            // Too few known names means the baseline has no opinion yet.
            if known.len() >= self.config.known_process_min {
                let unknown: HashSet<&str> = sample
                    .processes
                    .iter()
                    .map(|p| p.name.as_str())
                    .filter(|name| !known.contains_key(*name))
                    .collect();

                if unknown.len() > self.config.unknown_process_limit {
                    out.push(self.fixed_anomaly(
                        sample,
                        AnomalyType::Process,
                        Severity::Medium,
                        "unknown_processes",
                        format!("{} unknown process names", unknown.len()),
                        format!("at most {}", self.config.unknown_process_limit),
                        55.0,
                        format!(
                            "{} processes never seen on this device before",
                            unknown.len()
                        ),
                        "Review the unfamiliar processes for legitimacy".to_string(),
                    ));
                }
            }
        }
    }

    fn detect_system(
        &self,
        sample: &TelemetrySample,
        baseline: &Baseline,
        out: &mut Vec<Anomaly>,
    ) {
        // Resource checks are one-sided: only above-baseline usage is a
        // problem signal.
        for (feature, observed) in [
            (FEAT_CPU, sample.system.cpu_usage),
            (FEAT_MEMORY, sample.system.memory_usage),
        ] {
            if let Some(stats) = baseline.numeric_stats(feature) {
                if let Some(anomaly) = self.deviation_anomaly(
                    sample,
                    stats,
                    AnomalyType::SystemConfig,
                    feature,
                    observed,
                    true,
                ) {
                    out.push(anomaly);
                }
            }
        }
    }
}

impl Detector for StatisticalDetector {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Statistical
    }

    fn detect(&self, sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>> {
        let baselines = self.baselines.for_device(&sample.device_id)?;
        if baselines.is_empty() {
            return Ok(vec![]);
        }

        let mut out = Vec::new();
        for baseline in &baselines {
            match baseline.category {
                BaselineCategory::Authentication => {
                    self.detect_authentication(sample, baseline, &mut out)
                }
                BaselineCategory::Network => self.detect_network(sample, baseline, &mut out),
                BaselineCategory::Process => self.detect_process(sample, baseline, &mut out),
                BaselineCategory::System => self.detect_system(sample, baseline, &mut out),
            }
        }

        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::baseline::{BaselineKey, MemoryBaselineStore};
    use crate::telemetry::{
        AuthState, NetworkConnection, NetworkState, ProcessInfo, SecurityControls, SystemMetrics,
        TelemetrySample,
    };

    fn empty_baseline(category: BaselineCategory) -> Baseline {
        Baseline {
            device_id: "dev-1".to_string(),
            category,
            window_days: 30,
            sample_count: 50,
            confidence: 75.0,
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
            hourly: [1.0 / 24.0; 24],
            daily: [1.0 / 7.0; 7],
            built_at: Utc::now(),
        }
    }

    fn stats(mean: f64, std_dev: f64) -> FeatureStats {
        FeatureStats {
            mean,
            std_dev,
            min: 0.0,
            max: mean + 3.0 * std_dev,
            ..Default::default()
        }
    }

    fn sample() -> TelemetrySample {
        TelemetrySample {
            device_id: "dev-1".to_string(),
            // 10:30 UTC on a Wednesday.
            timestamp: Utc.with_ymd_and_hms(2025, 6, 4, 10, 30, 0).unwrap(),
            system: SystemMetrics {
                cpu_usage: 20.0,
                memory_usage: 40.0,
                disk_usage: 50.0,
                os_major_version: 15,
            },
            network: NetworkState {
                ssid: Some("office-wifi".to_string()),
                vpn_active: true,
                untrusted_network: false,
                connections: vec![NetworkConnection {
                    remote_address: "10.0.0.5".to_string(),
                    remote_port: 443,
                }],
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

    fn detector_with(baselines: Vec<Baseline>) -> StatisticalDetector {
        let store = Arc::new(MemoryBaselineStore::new());
        for b in baselines {
            store.upsert(b).unwrap();
        }
        StatisticalDetector::new(DetectionConfig::default(), store).unwrap()
    }

    #[test]
    fn test_no_baseline_returns_empty() {
        let detector = detector_with(vec![]);
        let found = detector.detect(&sample()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_extreme_deviation_is_critical_and_capped() {
        let mut baseline = empty_baseline(BaselineCategory::System);
        baseline
            .numeric
            .insert(FEAT_CPU.to_string(), stats(1.0, 1.0));
        let detector = detector_with(vec![baseline]);

        let mut s = sample();
        s.system.cpu_usage = 10.0; // z = 9
        s.system.memory_usage = 1.0;

        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        let anomaly = &found[0];
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.score, 100.0); // min(100, 9 * 20)
        assert_eq!(anomaly.deviation, Some(9.0));
        assert_eq!(anomaly.confidence, STATISTICAL_CONFIDENCE);
    }

    #[test]
    fn test_zero_std_dev_never_divides() {
        let mut baseline = empty_baseline(BaselineCategory::System);
        baseline
            .numeric
            .insert(FEAT_CPU.to_string(), stats(20.0, 0.0));
        let detector = detector_with(vec![baseline]);

        let mut s = sample();
        s.system.cpu_usage = 99.0;

        let found = detector.detect(&s).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_system_checks_are_one_sided() {
        let mut baseline = empty_baseline(BaselineCategory::System);
        baseline
            .numeric
            .insert(FEAT_CPU.to_string(), stats(50.0, 10.0));
        let detector = detector_with(vec![baseline]);

        let mut s = sample();
        s.system.cpu_usage = 5.0; // z = -4.5: far below mean, not a problem
        let found = detector.detect(&s).unwrap();
        assert!(found.is_empty());

        s.system.cpu_usage = 95.0; // z = +4.5
        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::High);
    }

    #[test]
    fn test_connection_deviation_is_two_sided() {
        let mut baseline = empty_baseline(BaselineCategory::Network);
        baseline
            .numeric
            .insert(FEAT_CONNECTIONS.to_string(), stats(40.0, 10.0));
        let detector = detector_with(vec![baseline]);

        // Far below baseline: a device that usually holds 40 connections
        // suddenly holding 1 is just as anomalous.
        let s = sample(); // one connection -> z = -3.9
        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, FEAT_CONNECTIONS);
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[test]
    fn test_rare_hour_fires_independently_of_z() {
        let mut baseline = empty_baseline(BaselineCategory::Authentication);
        baseline.hourly = [0.0; 24];
        baseline.hourly[9] = 1.0; // only ever active at 09:00
        let detector = detector_with(vec![baseline]);

        let s = sample(); // 10:30 -> frequency 0.0 for hour 10
        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "active_hour");
        assert_eq!(found[0].severity, Severity::Low);
        assert_eq!(found[0].score, 50.0);
        assert_eq!(found[0].deviation, None);
    }

    #[test]
    fn test_unknown_ssid_flagged() {
        let mut baseline = empty_baseline(BaselineCategory::Network);
        let mut known = BTreeMap::new();
        known.insert("home-wifi".to_string(), 30u64);
        baseline.categorical.insert(FEAT_SSID.to_string(), known);
        let detector = detector_with(vec![baseline]);

        let found = detector.detect(&sample()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, FEAT_SSID);
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].score, 60.0);
    }

    #[test]
    fn test_vpn_mismatch_requires_decisive_rate() {
        // Habitually on (rate 0.95), sample has VPN off.
        let mut baseline = empty_baseline(BaselineCategory::Network);
        baseline
            .numeric
            .insert(FEAT_VPN_RATE.to_string(), stats(0.95, 0.0));
        let detector = detector_with(vec![baseline]);

        let mut s = sample();
        s.network.vpn_active = false;
        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "vpn_active");
        assert_eq!(found[0].score, 40.0);

        // Indecisive rate (0.5): no opinion either way.
        let mut baseline = empty_baseline(BaselineCategory::Network);
        baseline
            .numeric
            .insert(FEAT_VPN_RATE.to_string(), stats(0.5, 0.0));
        let detector = detector_with(vec![baseline]);
        let found = detector.detect(&s).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_unknown_processes_need_established_baseline() {
        let mut s = sample();
        s.processes = (0..5)
            .map(|i| ProcessInfo {
                name: format!("strange-{i}"),
                pid: 100 + i,
            })
            .collect();

        // Only 2 known names: baseline too thin, no finding.
        let mut baseline = empty_baseline(BaselineCategory::Process);
        let known: BTreeMap<String, u64> = [("launchd", 10u64), ("editor", 9u64)]
            .iter()
            .map(|(n, c)| (n.to_string(), *c))
            .collect();
        baseline
            .categorical
            .insert(FEAT_PROCESS_NAME.to_string(), known.clone());
        let detector = detector_with(vec![baseline]);
        assert!(detector.detect(&s).unwrap().is_empty());

        // 5 known names: check applies, 5 unknown > 3 fires.
        let mut baseline = empty_baseline(BaselineCategory::Process);
        let mut known = known;
        known.insert("finder".to_string(), 8);
        known.insert("dock".to_string(), 7);
        known.insert("shell".to_string(), 6);
        baseline
            .categorical
            .insert(FEAT_PROCESS_NAME.to_string(), known);
        let detector = detector_with(vec![baseline]);

        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "unknown_processes");
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].score, 55.0);
    }

    #[test]
    fn test_failed_auth_deviation() {
        let mut baseline = empty_baseline(BaselineCategory::Authentication);
        baseline
            .numeric
            .insert(FEAT_FAILED_AUTH.to_string(), stats(0.5, 0.5));
        let detector = detector_with(vec![baseline]);

        let mut s = sample();
        s.auth.failed_auth_count = 3; // z = 5.0
        let found = detector.detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, FEAT_FAILED_AUTH);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].score, 100.0);
    }

    #[test]
    fn test_store_lookup_by_key() {
        let store = Arc::new(MemoryBaselineStore::new());
        store
            .upsert(empty_baseline(BaselineCategory::Network))
            .unwrap();
        let key = BaselineKey::new("dev-1", BaselineCategory::Network);
        assert!(store.get(&key).unwrap().is_some());
    }
}
