//! Store seams for historical telemetry and learned baselines.
//!
//! Persistence technology belongs to the caller; the core only needs these
//! two traits. The in-memory implementations double as the test fixtures and
//! as a usable default for embedded deployments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::types::{Baseline, BaselineKey};
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

// ============================================================================
// TRAITS
// ============================================================================

/// Read access to historical telemetry for baseline learning.
pub trait SampleStore: Send + Sync {
    /// All samples for a device at or after `cutoff`, oldest first.
    fn samples_since(
        &self,
        device_id: &str,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<TelemetrySample>>;
}

/// Per-key baseline persistence. `upsert` must apply the whole
/// read-modify-write as one transaction; concurrent builders for the same
/// key must never interleave into a corrupt record.
pub trait BaselineStore: Send + Sync {
    fn get(&self, key: &BaselineKey) -> CoreResult<Option<Baseline>>;
    fn upsert(&self, baseline: Baseline) -> CoreResult<()>;
    /// Every stored baseline for a device, in category order.
    fn for_device(&self, device_id: &str) -> CoreResult<Vec<Baseline>>;
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================================

#[derive(Default)]
pub struct MemorySampleStore {
    samples: RwLock<HashMap<String, Vec<TelemetrySample>>>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sample: TelemetrySample) {
        self.samples
            .write()
            .entry(sample.device_id.clone())
            .or_default()
            .push(sample);
    }

    pub fn record_all(&self, samples: Vec<TelemetrySample>) {
        for sample in samples {
            self.record(sample);
        }
    }
}

impl SampleStore for MemorySampleStore {
    fn samples_since(
        &self,
        device_id: &str,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<TelemetrySample>> {
        let guard = self.samples.read();
        let mut found: Vec<TelemetrySample> = guard
            .get(device_id)
            .map(|all| {
                all.iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemoryBaselineStore {
    // The write guard spans the whole upsert, which is what makes
    // read-modify-write a single transaction per key.
    baselines: RwLock<HashMap<BaselineKey, Baseline>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.baselines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.read().is_empty()
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn get(&self, key: &BaselineKey) -> CoreResult<Option<Baseline>> {
        Ok(self.baselines.read().get(key).cloned())
    }

    fn upsert(&self, baseline: Baseline) -> CoreResult<()> {
        self.baselines.write().insert(baseline.key(), baseline);
        Ok(())
    }

    fn for_device(&self, device_id: &str) -> CoreResult<Vec<Baseline>> {
        let guard = self.baselines.read();
        let mut found: Vec<Baseline> = guard
            .values()
            .filter(|b| b.device_id == device_id)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.category);
        Ok(found)
    }
}
