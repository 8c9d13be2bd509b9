//! Degrade controller: error-rate gate for guarded code paths.
//!
//! A flag is tracked when degrade is enabled engine-wide or when the flag
//! carries its own [`DegradeConfig`]. Once a tracked flag has seen at least
//! `min` requests and its errors exceed `threshold * requests`, the flag
//! is forced off. There is no automatic recovery.

use serde::{Deserialize, Serialize};

use crate::error::{RolloutError, RolloutResult};
use crate::feature::Feature;

/// Degrade thresholds, either engine-wide or attached to a single flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradeConfig {
    /// Requests required before the error rate is judged.
    pub min: u64,
    /// Tolerated error fraction (0.0-1.0).
    pub threshold: f64,
}

impl Default for DegradeConfig {
    fn default() -> Self {
        Self {
            min: 100,
            threshold: 0.1,
        }
    }
}

impl DegradeConfig {
    pub fn new(min: u64, threshold: f64) -> Self {
        Self { min, threshold }
    }

    pub fn validate(&self) -> RolloutResult<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(RolloutError::Configuration(format!(
                "degrade threshold must be within 0.0..=1.0, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Where a flag stands relative to its degrade thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DegradeVerdict {
    /// Neither the engine nor the flag enables tracking.
    NotTracked,
    /// Not enough requests yet to judge.
    Warming { requests: u64, min: u64 },
    /// Error rate at or under the threshold.
    Healthy,
    /// Error rate strictly above the threshold; the flag must degrade.
    Exceeded,
}

/// Decides whether a flag's counters call for degradation.
#[derive(Debug, Clone, Default)]
pub struct DegradeController {
    /// Engine-wide thresholds. `None` means only flags with their own
    /// config are tracked.
    defaults: Option<DegradeConfig>,
}

impl DegradeController {
    pub fn new(defaults: Option<DegradeConfig>) -> Self {
        Self { defaults }
    }

    /// Whether request/error counters are kept for this flag.
    pub fn tracks(&self, feature: &Feature) -> bool {
        self.defaults.is_some() || feature.degrade.is_some()
    }

    /// The flag's own config wins over the engine default.
    pub fn effective_config(&self, feature: &Feature) -> Option<DegradeConfig> {
        feature.degrade.or(self.defaults)
    }

    pub fn verdict(&self, feature: &Feature) -> DegradeVerdict {
        let Some(config) = self.effective_config(feature) else {
            return DegradeVerdict::NotTracked;
        };

        if feature.requests < config.min {
            return DegradeVerdict::Warming {
                requests: feature.requests,
                min: config.min,
            };
        }

        if exceeds(feature.errors, feature.requests, config.threshold) {
            DegradeVerdict::Exceeded
        } else {
            DegradeVerdict::Healthy
        }
    }

    pub fn should_degrade(&self, feature: &Feature) -> bool {
        self.verdict(feature) == DegradeVerdict::Exceeded
    }
}

/// `errors > threshold * requests`. Sitting exactly on the line is healthy.
fn exceeds(errors: u64, requests: u64, threshold: f64) -> bool {
    errors as f64 > threshold * requests as f64
}
