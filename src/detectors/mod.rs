//! Detectors
//!
//! One shared seam: a detector inspects a single telemetry sample and emits
//! zero or more anomalies. The three implementations (rule-based,
//! statistical, model-backed) are handed to the engine explicitly, in fixed
//! order - no registry, no discovery.

pub mod heuristic;
pub mod rules;
pub mod statistical;

use crate::anomaly::{Anomaly, DetectionMethod};
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

pub use heuristic::{extract_features, HeuristicDetector, HeuristicModel, ModelScorer};
pub use rules::RuleBasedDetector;
pub use statistical::StatisticalDetector;

pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    fn method(&self) -> DetectionMethod;

    /// Inspect one sample. Errors are isolated by the engine: a failing
    /// detector contributes nothing, it never aborts the cycle.
    fn detect(&self, sample: &TelemetrySample) -> CoreResult<Vec<Anomaly>>;
}
