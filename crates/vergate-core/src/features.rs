//! Feature flags and the version-gated feature matrix
//!
//! Capabilities are a closed named set, each gated by the revision that
//! introduced it and optionally the revision that removed it. The matrix is
//! pure and static: no I/O, read-only after construction.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::ApiVersion;

/// Closed set of platform capabilities gated by server version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Pre-2.41 tracked-entity endpoints (`/api/trackedEntityInstances`)
    LegacyTrackerApi,
    /// Consolidated tracker endpoints under `/api/tracker`
    NewTrackerApi,
    /// Server-side working lists for tracked entities
    WorkingLists,
    /// Aggregate data exchange push/pull
    AggregateDataExchange,
    /// Unified visualizations resource
    VisualizationsApi,
    /// Continuously updated analytics tables
    ContinuousAnalytics,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::LegacyTrackerApi,
        Feature::NewTrackerApi,
        Feature::WorkingLists,
        Feature::AggregateDataExchange,
        Feature::VisualizationsApi,
        Feature::ContinuousAnalytics,
    ];

    /// Stable identifier, matching the serde form
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::LegacyTrackerApi => "legacy_tracker_api",
            Feature::NewTrackerApi => "new_tracker_api",
            Feature::WorkingLists => "working_lists",
            Feature::AggregateDataExchange => "aggregate_data_exchange",
            Feature::VisualizationsApi => "visualizations_api",
            Feature::ContinuousAnalytics => "continuous_analytics",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Version bounds for a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGate {
    pub feature: Feature,
    pub introduced_at: ApiVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<ApiVersion>,
}

impl FeatureGate {
    /// Gate with no removal bound
    pub fn introduced(feature: Feature, introduced_at: ApiVersion) -> Self {
        Self {
            feature,
            introduced_at,
            removed_at: None,
        }
    }

    /// Gate with both bounds
    pub fn bounded(feature: Feature, introduced_at: ApiVersion, removed_at: ApiVersion) -> Self {
        Self {
            feature,
            introduced_at,
            removed_at: Some(removed_at),
        }
    }
}

/// Static table mapping each feature to the version band where it is supported
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    gates: HashMap<Feature, FeatureGate>,
}

impl FeatureMatrix {
    /// Build a matrix from gate rows
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a feature appears twice (the
    /// source tables are known to disagree on some introduction versions,
    /// and contradictions must be rejected, not resolved) or a gate closes
    /// at or before it opens.
    pub fn new(rows: Vec<FeatureGate>) -> Result<Self> {
        let mut gates = HashMap::with_capacity(rows.len());
        for gate in rows {
            if let Some(removed_at) = &gate.removed_at {
                if *removed_at <= gate.introduced_at {
                    return Err(Error::configuration(format!(
                        "feature '{}' is removed at {} but introduced at {}",
                        gate.feature, removed_at, gate.introduced_at
                    )));
                }
            }
            if let Some(previous) = gates.insert(gate.feature, gate) {
                return Err(Error::configuration(format!(
                    "contradictory gates for feature '{}' (already introduced at {})",
                    previous.feature, previous.introduced_at
                )));
            }
        }
        Ok(Self { gates })
    }

    /// True iff `feature` is supported at `version`
    ///
    /// A feature with no gate row is supported at no version.
    pub fn is_supported(&self, feature: Feature, version: &ApiVersion) -> bool {
        self.gates.get(&feature).map_or(false, |gate| {
            *version >= gate.introduced_at
                && gate
                    .removed_at
                    .as_ref()
                    .map_or(true, |removed| version < removed)
        })
    }

    /// The gate row for a feature, if registered
    pub fn gate(&self, feature: Feature) -> Option<&FeatureGate> {
        self.gates.get(&feature)
    }

    /// The minimum version at which a feature becomes available
    pub fn minimum_version(&self, feature: Feature) -> Option<&ApiVersion> {
        self.gates.get(&feature).map(|gate| &gate.introduced_at)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
