//! Risk & Anomaly Scoring Core
//!
//! In-process computation library that turns raw endpoint telemetry into a
//! statistically-grounded anomaly list and a weighted composite risk score.
//! It sits between telemetry ingestion and the alerting / workflow /
//! reporting consumers; collection, persistence technology and transport all
//! belong to those collaborators.
//!
//! ## Engines
//! - `baseline` - learns per-device, per-category statistical baselines
//! - `detectors` - rule-based, statistical and model-backed detection
//! - `engine` - per-sample orchestration, dedup, running stats
//! - `risk` - four-dimension weighted risk assessment
//!
//! All entry points are synchronous over immutable inputs; the stores are
//! the only mutable resources. Configuration is explicit and validated at
//! construction - there are no globals.

pub mod anomaly;
pub mod baseline;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod risk;
pub mod telemetry;

pub use anomaly::{Anomaly, AnomalyType, DetectionMethod, Severity};
pub use baseline::{
    Baseline, BaselineBuilder, BaselineCategory, BaselineKey, BaselineStore, FeatureStats,
    MemoryBaselineStore, MemorySampleStore, SampleStore,
};
pub use config::{
    BaselineConfig, CoreConfig, DetectionConfig, RiskConfig, RiskThresholds, RiskWeights,
};
pub use detectors::{
    Detector, HeuristicDetector, HeuristicModel, ModelScorer, RuleBasedDetector,
    StatisticalDetector,
};
pub use engine::{DetectionEngine, EngineStats};
pub use error::{CoreError, CoreResult};
pub use risk::{
    ComponentScores, Recommendation, RiskAssessment, RiskAssessor, RiskFactor, RiskLevel,
};
pub use telemetry::{
    AuthState, ComplianceResult, ComplianceViolation, NetworkConnection, NetworkState,
    ProcessInfo, SecurityControls, SecurityEvent, SystemMetrics, TelemetrySample,
};
