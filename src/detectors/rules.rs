//! Rule-Based Detector
//!
//! Fixed boolean security rules, independent of any baseline. Each rule is
//! evaluated in isolation: a failing rule is logged and skipped, it never
//! blocks the others.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use super::Detector;
use crate::anomaly::{Anomaly, AnomalyType, DetectionMethod, Severity};
use crate::config::DetectionConfig;
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

/// All rule findings carry the same fixed confidence.
const RULE_CONFIDENCE: f64 = 0.95;

/// Process names matching any of these are treated as known-hostile tooling.
static MALICIOUS_PROCESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)mimikatz|lazagne|procdump|meterpreter|cobaltstrike|keylogger|netcat|cryptominer|xmrig",
    )
    .expect("malicious process pattern is statically valid")
});

/// Remote ports associated with common backdoors / C2 channels. Shared with
/// the behavioral risk scorer.
pub static SUSPICIOUS_PORTS: &[u16] = &[23, 1337, 4444, 5554, 6667, 9001, 31337];

/// True when the process name matches the hostile-tooling pattern.
pub fn is_malicious_process_name(name: &str) -> bool {
    MALICIOUS_PROCESS_RE.is_match(name)
}

pub struct RuleBasedDetector {
    config: DetectionConfig,
}

impl RuleBasedDetector {
    pub fn new(config: DetectionConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn anomaly(
        &self,
        sample: &TelemetrySample,
        anomaly_type: AnomalyType,
        severity: Severity,
        feature: &str,
        observed: String,
        expected: String,
        score: f64,
        description: String,
        recommendations: Vec<String>,
    ) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            device_id: sample.device_id.clone(),
            anomaly_type,
            severity,
            method: DetectionMethod::RuleBased,
            feature: feature.to_string(),
            observed,
            expected,
            deviation: None,
            score,
            confidence: RULE_CONFIDENCE,
            description,
            recommendations,
            detected_at: chrono::Utc::now(),
        }
    }

    /// Two or more core protection tools disabled at once.
    fn rule_security_controls(&self, sample: &TelemetrySample) -> CoreResult<Option<Anomaly>> {
        let disabled = sample.security.disabled_tool_count();
        if disabled < self.config.rules.min_disabled_controls {
            return Ok(None);
        }

        let mut off = Vec::new();
        if !sample.security.disk_encryption {
            off.push("disk encryption");
        }
        if !sample.security.integrity_protection {
            off.push("integrity protection");
        }
        if !sample.security.firewall {
            off.push("firewall");
        }
        if !sample.security.app_gatekeeping {
            off.push("app gatekeeping");
        }

        Ok(Some(self.anomaly(
            sample,
            AnomalyType::SystemConfig,
            Severity::Critical,
            "security_controls",
            format!("{disabled} protection tools disabled"),
            "all protection tools enabled".to_string(),
            95.0,
            format!("Core protections disabled: {}", off.join(", ")),
            off.iter().map(|tool| format!("Re-enable {tool}")).collect(),
        )))
    }

    /// Brute-force indicator: too many failed authentication attempts.
    fn rule_failed_auth(&self, sample: &TelemetrySample) -> CoreResult<Option<Anomaly>> {
        let failed = sample.auth.failed_auth_count;
        if failed < self.config.rules.max_failed_auth {
            return Ok(None);
        }

        Ok(Some(self.anomaly(
            sample,
            AnomalyType::Authentication,
            Severity::High,
            "failed_auth_count",
            failed.to_string(),
            format!("fewer than {}", self.config.rules.max_failed_auth),
            80.0,
            format!("{failed} failed authentication attempts"),
            vec!["Verify the account is not under a brute-force attack".to_string()],
        )))
    }

    /// Network exposure: connection flood, or an untrusted network without
    /// VPN protection.
    fn rule_network_exposure(&self, sample: &TelemetrySample) -> CoreResult<Option<Anomaly>> {
        let connections = sample.network.connection_count();
        let flood = connections > self.config.rules.max_connections;
        let exposed = !sample.network.vpn_active && sample.network.untrusted_network;
        if !flood && !exposed {
            return Ok(None);
        }

        let description = if flood {
            format!("{connections} simultaneous network connections")
        } else {
            "Untrusted network without VPN protection".to_string()
        };

        Ok(Some(self.anomaly(
            sample,
            AnomalyType::Network,
            Severity::Medium,
            "active_connections",
            format!("{connections} connections, vpn={}", sample.network.vpn_active),
            format!(
                "at most {} connections, VPN on untrusted networks",
                self.config.rules.max_connections
            ),
            60.0,
            description,
            vec!["Enable the VPN and review open connections".to_string()],
        )))
    }

    /// Known-hostile tooling by process name.
    fn rule_malicious_process(&self, sample: &TelemetrySample) -> CoreResult<Option<Anomaly>> {
        let matched: Vec<&str> = sample
            .processes
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| is_malicious_process_name(name))
            .collect();

        if matched.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.anomaly(
            sample,
            AnomalyType::Process,
            Severity::Critical,
            "process_name",
            matched.join(", "),
            "no known-hostile process names".to_string(),
            95.0,
            format!("Known attack tooling running: {}", matched.join(", ")),
            vec!["Isolate the device and capture forensics immediately".to_string()],
        )))
    }

    /// Disk pressure: full disks break logging, updates and encryption.
    fn rule_disk_pressure(&self, sample: &TelemetrySample) -> CoreResult<Option<Anomaly>> {
        let usage = sample.system.disk_usage;
        if usage <= self.config.rules.max_disk_usage {
            return Ok(None);
        }

        Ok(Some(self.anomaly(
            sample,
            AnomalyType::SystemConfig,
            Severity::High,
            "disk_usage",
            format!("{usage:.1}%"),
            format!("at most {:.1}%", self.config.rules.max_disk_usage),
            80.0,
            format!("Disk usage at {usage:.1}%"),
            vec!["Free disk space before updates start failing".to_string()],
        )))
    }
}

impl Detector for RuleBasedDetector {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::RuleBased
    }

    fn detect(&self, sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>> {
        type Rule = fn(&RuleBasedDetector, &TelemetrySample) -> CoreResult<Option<Anomaly>>;
        const RULES: &[(&str, Rule)] = &[
            ("security_controls", RuleBasedDetector::rule_security_controls),
            ("failed_auth", RuleBasedDetector::rule_failed_auth),
            ("network_exposure", RuleBasedDetector::rule_network_exposure),
            ("malicious_process", RuleBasedDetector::rule_malicious_process),
            ("disk_pressure", RuleBasedDetector::rule_disk_pressure),
        ];

        let mut out = Vec::new();
        for (rule_name, rule) in RULES {
            match rule(self, sample) {
                Ok(Some(anomaly)) => out.push(anomaly),
                Ok(None) => {}
                Err(e) => {
                    // One broken rule must never silence the rest.
                    log::warn!("rule '{rule_name}' failed on {}: {e}", sample.device_id);
                }
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
    use chrono::Utc;

    use super::*;
    use crate::telemetry::{
        AuthState, NetworkConnection, NetworkState, ProcessInfo, SecurityControls, SystemMetrics,
    };

    fn clean_sample() -> TelemetrySample {
        TelemetrySample {
            device_id: "dev-1".to_string(),
            timestamp: Utc::now(),
            system: SystemMetrics {
                cpu_usage: 15.0,
                memory_usage: 40.0,
                disk_usage: 60.0,
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

    fn detector() -> RuleBasedDetector {
        RuleBasedDetector::new(DetectionConfig::default()).unwrap()
    }

    #[test]
    fn test_clean_sample_produces_nothing() {
        let found = detector().detect(&clean_sample()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_all_controls_disabled_is_one_critical() {
        let mut s = clean_sample();
        s.security.disk_encryption = false;
        s.security.firewall = false;
        s.security.app_gatekeeping = false;
        s.security.integrity_protection = false;

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1, "exactly one controls anomaly");
        let anomaly = &found[0];
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.score, 95.0);
        assert_eq!(anomaly.confidence, 0.95);
        assert_eq!(anomaly.feature, "security_controls");
        assert_eq!(anomaly.recommendations.len(), 4);
    }

    #[test]
    fn test_single_disabled_control_stays_quiet() {
        let mut s = clean_sample();
        s.security.firewall = false;

        let found = detector().detect(&s).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_failed_auth_threshold() {
        let mut s = clean_sample();
        s.auth.failed_auth_count = 9;
        assert!(detector().detect(&s).unwrap().is_empty());

        s.auth.failed_auth_count = 10;
        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].score, 80.0);
    }

    #[test]
    fn test_connection_flood() {
        let mut s = clean_sample();
        s.network.connections = (0..101)
            .map(|i| NetworkConnection {
                remote_address: format!("10.0.0.{}", i % 250),
                remote_port: 443,
            })
            .collect();

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "active_connections");
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].score, 60.0);
    }

    #[test]
    fn test_untrusted_network_without_vpn() {
        let mut s = clean_sample();
        s.network.vpn_active = false;
        s.network.untrusted_network = true;

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "active_connections");

        // VPN on the same network: covered.
        s.network.vpn_active = true;
        assert!(detector().detect(&s).unwrap().is_empty());
    }

    #[test]
    fn test_malicious_process_name() {
        let mut s = clean_sample();
        s.processes.push(ProcessInfo {
            name: "Mimikatz.exe".to_string(),
            pid: 666,
        });

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Critical);
        assert_eq!(found[0].score, 95.0);
        assert!(found[0].observed.contains("Mimikatz.exe"));
    }

    #[test]
    fn test_disk_pressure() {
        let mut s = clean_sample();
        s.system.disk_usage = 97.5;

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feature, "disk_usage");
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].score, 80.0);
    }

    #[test]
    fn test_independent_rules_all_fire() {
        let mut s = clean_sample();
        s.security.disk_encryption = false;
        s.security.integrity_protection = false;
        s.auth.failed_auth_count = 25;
        s.system.disk_usage = 99.0;

        let found = detector().detect(&s).unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_keyword_matching_is_case_insensitive() {
        assert!(is_malicious_process_name("XMRig"));
        assert!(is_malicious_process_name("helper-netcat"));
        assert!(!is_malicious_process_name("notepad"));
    }
}
