//! Feature: the persisted unit of flag configuration and usage counters.
//!
//! The record is stored as JSON under `{prefix}:{name}`; the name itself
//! lives only in the key. Counters that were never incremented are left
//! out of the encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{self, MAX_PERCENTAGE};
use crate::degrade::DegradeConfig;
use crate::error::{RolloutError, RolloutResult};

/// One feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Unique flag name. Not part of the stored value.
    #[serde(skip)]
    pub name: String,
    /// Share of determinators for which the flag is active (0-100).
    pub percentage: u8,
    /// Guarded invocations observed since activation.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub requests: u64,
    /// Failed guarded invocations since activation.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub errors: u64,
    /// Per-flag degrade override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrade: Option<DegradeConfig>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_at: Option<DateTime<Utc>>,
}

impl Feature {
    /// A freshly activated flag with zeroed counters.
    pub fn new(name: &str, percentage: u8, degrade: Option<DegradeConfig>) -> Self {
        Self {
            name: name.to_string(),
            percentage: percentage.min(MAX_PERCENTAGE),
            requests: 0,
            errors: 0,
            degrade,
            degraded: false,
            degraded_at: None,
        }
    }

    /// Decode a stored record. `key` is only used for error reporting.
    pub fn decode(name: &str, key: &str, raw: &[u8]) -> RolloutResult<Self> {
        let mut feature: Feature =
            serde_json::from_slice(raw).map_err(|e| RolloutError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if feature.percentage > MAX_PERCENTAGE {
            return Err(RolloutError::Corrupt {
                key: key.to_string(),
                reason: format!("percentage {} out of range", feature.percentage),
            });
        }
        feature.name = name.to_string();
        Ok(feature)
    }

    pub fn encode(&self) -> Vec<u8> {
        // Plain fields only; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Bucketing decision for this flag.
    pub fn is_active(&self, determinator: Option<&str>) -> bool {
        bucket::decide_for(determinator.map(str::as_bytes), self.percentage)
    }

    pub fn add_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub fn add_error(&mut self) {
        self.errors = self.errors.saturating_add(1);
    }

    /// Terminal degrade transition: forced off, counters kept for audit.
    pub fn mark_degraded(&mut self, at: DateTime<Utc>) {
        self.percentage = 0;
        self.degraded = true;
        self.degraded_at = Some(at);
    }

    pub fn summary(&self) -> FeatureSummary {
        FeatureSummary {
            name: self.name.clone(),
            percentage: self.percentage,
            requests: self.requests,
            errors: self.errors,
            degrade: self.degrade,
            degraded: self.degraded,
        }
    }
}

/// Listing view of a flag, as returned by [`crate::Rollout::features`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub name: String,
    pub percentage: u8,
    pub requests: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrade: Option<DegradeConfig>,
    #[serde(skip_serializing_if = "is_false")]
    pub degraded: bool,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}
