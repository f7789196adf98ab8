//! Telemetry Input Types
//!
//! Data structures only - collection is a collaborator's job. Samples are
//! immutable once handed to the core; nothing here is ever mutated by the
//! detection or risk engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::Severity;

// ============================================================================
// TELEMETRY SAMPLE
// ============================================================================

/// One point-in-time observation of an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub network: NetworkState,
    pub processes: Vec<ProcessInfo>,
    pub security: SecurityControls,
    pub auth: AuthState,
}

/// Resource usage, all as percentages (0-100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub os_major_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkState {
    pub ssid: Option<String>,
    pub vpn_active: bool,
    /// Public / untrusted network (hotel, cafe, unknown Wi-Fi).
    pub untrusted_network: bool,
    pub connections: Vec<NetworkConnection>,
}

impl NetworkState {
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub remote_address: String,
    pub remote_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: u32,
}

/// Endpoint security control states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityControls {
    pub disk_encryption: bool,
    pub firewall: bool,
    pub app_gatekeeping: bool,
    pub integrity_protection: bool,
    pub screen_lock: bool,
    pub password_required: bool,
}

impl SecurityControls {
    /// Count of the four core protection tools currently disabled
    /// (encryption, integrity protection, firewall, gatekeeping).
    pub fn disabled_tool_count(&self) -> usize {
        [
            self.disk_encryption,
            self.integrity_protection,
            self.firewall,
            self.app_gatekeeping,
        ]
        .iter()
        .filter(|enabled| !**enabled)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub failed_auth_count: u32,
}

// ============================================================================
// COMPLIANCE
// ============================================================================

/// Result of an external compliance evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub is_compliant: bool,
    /// 0-100, higher is better.
    pub compliance_score: f64,
    pub violations: Vec<ComplianceViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub name: String,
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub current: String,
    pub expected: String,
    pub remediation: String,
    pub impact: String,
}

// ============================================================================
// SECURITY EVENTS
// ============================================================================

/// Recent security event supplied by an external collaborator, folded into
/// the threat-indicator risk dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub description: String,
}
