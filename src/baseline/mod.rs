//! Baseline Builder - learns per-device, per-category "normal"
//!
//! Pulls historical samples from the sample store, summarizes them into a
//! [`Baseline`] and persists it through the baseline store. "Not enough
//! history" is a defined outcome (`Ok(None)`), not an error - downstream
//! statistical detection simply skips devices without a baseline.

pub mod stats;
pub mod store;
pub mod types;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::config::BaselineConfig;
use crate::error::CoreResult;
use crate::telemetry::TelemetrySample;

pub use store::{BaselineStore, MemoryBaselineStore, MemorySampleStore, SampleStore};
pub use types::{confidence_for, Baseline, BaselineCategory, BaselineKey, FeatureStats};

// Feature names, shared with the statistical detector.
pub const FEAT_FAILED_AUTH: &str = "failed_auth_count";
pub const FEAT_CONNECTIONS: &str = "active_connections";
pub const FEAT_VPN_RATE: &str = "vpn_usage_rate";
pub const FEAT_PROCESS_COUNT: &str = "process_count";
pub const FEAT_CPU: &str = "cpu_usage";
pub const FEAT_MEMORY: &str = "memory_usage";
pub const FEAT_DISK: &str = "disk_usage";
pub const FEAT_SSID: &str = "ssid";
pub const FEAT_PROCESS_NAME: &str = "process_name";

pub struct BaselineBuilder {
    config: BaselineConfig,
    samples: Arc<dyn SampleStore>,
    baselines: Arc<dyn BaselineStore>,
}

impl BaselineBuilder {
    pub fn new(
        config: BaselineConfig,
        samples: Arc<dyn SampleStore>,
        baselines: Arc<dyn BaselineStore>,
    ) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            samples,
            baselines,
        })
    }

    /// Build (or reuse) the baseline for one (device, category).
    ///
    /// Returns the stored baseline unchanged when it is still fresh and
    /// `force` is false; `Ok(None)` when the learning window holds fewer
    /// than the configured minimum of samples.
    pub fn build(
        &self,
        device_id: &str,
        category: BaselineCategory,
        force: bool,
    ) -> CoreResult<Option<Baseline>> {
        let now = Utc::now();
        let key = BaselineKey::new(device_id, category);

        if !force {
            if let Some(existing) = self.baselines.get(&key)? {
                if existing.is_fresh(Duration::hours(self.config.max_age_hours), now) {
                    return Ok(Some(existing));
                }
                log::debug!(
                    "baseline {}/{} is stale, rebuilding",
                    device_id,
                    category
                );
            }
        }

        let cutoff = now - Duration::days(self.config.learning_window_days);
        let history = self.samples.samples_since(device_id, cutoff)?;

        if history.len() < self.config.min_samples {
            log::debug!(
                "skipping baseline {}/{}: {} samples < minimum {}",
                device_id,
                category,
                history.len(),
                self.config.min_samples
            );
            return Ok(None);
        }

        let baseline = self.summarize(device_id, category, &history, now);
        self.baselines.upsert(baseline.clone())?;

        log::info!(
            "built baseline {}/{} from {} samples (confidence {:.0})",
            device_id,
            category,
            baseline.sample_count,
            baseline.confidence
        );

        Ok(Some(baseline))
    }

    fn summarize(
        &self,
        device_id: &str,
        category: BaselineCategory,
        history: &[TelemetrySample],
        now: DateTime<Utc>,
    ) -> Baseline {
        let mut numeric = BTreeMap::new();
        for (feature, values) in numeric_features(category, history) {
            numeric.insert(feature.to_string(), stats::summarize(&values));
        }

        let mut categorical = BTreeMap::new();
        match category {
            BaselineCategory::Network => {
                let ssids = history.iter().filter_map(|s| s.network.ssid.clone());
                categorical.insert(
                    FEAT_SSID.to_string(),
                    top_k_frequencies(ssids, self.config.top_networks),
                );
            }
            BaselineCategory::Process => {
                let names = history
                    .iter()
                    .flat_map(|s| s.processes.iter().map(|p| p.name.clone()));
                categorical.insert(
                    FEAT_PROCESS_NAME.to_string(),
                    top_k_frequencies(names, self.config.top_processes),
                );
            }
            BaselineCategory::Authentication | BaselineCategory::System => {}
        }

        let (hourly, daily) = temporal_histograms(history);

        Baseline {
            device_id: device_id.to_string(),
            category,
            window_days: self.config.learning_window_days,
            sample_count: history.len(),
            confidence: confidence_for(history.len(), self.config.min_samples),
            numeric,
            categorical,
            hourly,
            daily,
            built_at: now,
        }
    }
}

/// Fixed numeric feature set per category.
fn numeric_features(
    category: BaselineCategory,
    history: &[TelemetrySample],
) -> Vec<(&'static str, Vec<f64>)> {
    match category {
        BaselineCategory::Authentication => vec![(
            FEAT_FAILED_AUTH,
            history
                .iter()
                .map(|s| s.auth.failed_auth_count as f64)
                .collect(),
        )],
        BaselineCategory::Network => vec![
            (
                FEAT_CONNECTIONS,
                history
                    .iter()
                    .map(|s| s.network.connection_count() as f64)
                    .collect(),
            ),
            (
                FEAT_VPN_RATE,
                history
                    .iter()
                    .map(|s| if s.network.vpn_active { 1.0 } else { 0.0 })
                    .collect(),
            ),
        ],
        BaselineCategory::Process => vec![(
            FEAT_PROCESS_COUNT,
            history.iter().map(|s| s.processes.len() as f64).collect(),
        )],
        BaselineCategory::System => vec![
            (
                FEAT_CPU,
                history.iter().map(|s| s.system.cpu_usage).collect(),
            ),
            (
                FEAT_MEMORY,
                history.iter().map(|s| s.system.memory_usage).collect(),
            ),
            (
                FEAT_DISK,
                history.iter().map(|s| s.system.disk_usage).collect(),
            ),
        ],
    }
}

/// Keep only the K most frequent values; ties break alphabetically so the
/// result is deterministic. The tail is dropped on purpose.
fn top_k_frequencies<I: Iterator<Item = String>>(values: I, k: usize) -> BTreeMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked.into_iter().collect()
}

/// Frequency-normalized hour-of-day / day-of-week histograms.
fn temporal_histograms(history: &[TelemetrySample]) -> ([f64; 24], [f64; 7]) {
    let mut hourly = [0.0f64; 24];
    let mut daily = [0.0f64; 7];

    for sample in history {
        hourly[sample.timestamp.hour() as usize] += 1.0;
        daily[sample.timestamp.weekday().num_days_from_monday() as usize] += 1.0;
    }

    let n = history.len() as f64;
    if n > 0.0 {
        for slot in hourly.iter_mut() {
            *slot /= n;
        }
        for slot in daily.iter_mut() {
            *slot /= n;
        }
    }

    (hourly, daily)
}
