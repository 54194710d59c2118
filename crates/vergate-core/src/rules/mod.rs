//! Adaptation rules: data-driven mapping from (logical operation, version
//! range) to a concrete endpoint, parameter shape, and response shape
//!
//! Rules replace "if version >= X" branching with range-keyed tables. For a
//! given operation the registered ranges must tile a contiguous band:
//! overlaps and interior gaps are configuration errors at load time. A
//! missing tail band is legal and models hard endpoint removal; resolution
//! at such a version fails deterministically instead of degrading.

pub mod adapter;
pub mod response;
pub mod transform;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::Feature;
use crate::version::{ApiVersion, VersionRange};

pub use adapter::{adapt_request, AdaptedRequest};
pub use response::adapt_response;
pub use transform::ValueTransform;

/// Concrete endpoint for one version band
///
/// The path may contain `{placeholder}` segments filled from (and consuming)
/// request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl EndpointTemplate {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            path: path.into(),
        }
    }
}

/// Canonical-to-remote parameter rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRename {
    pub from: String,
    pub to: String,
}

impl ParamRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Transform applied to one named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTransform {
    pub param: String,
    pub transform: ValueTransform,
}

impl ParamTransform {
    pub fn new(param: impl Into<String>, transform: ValueTransform) -> Self {
        Self {
            param: param.into(),
            transform,
        }
    }
}

/// Remote-to-canonical response field rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRename {
    pub remote: String,
    pub canonical: String,
}

impl FieldRename {
    pub fn new(remote: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            canonical: canonical.into(),
        }
    }
}

/// How a version band's response maps back to the canonical shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    /// Applied recursively at every object level; unknown fields pass through
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_renames: Vec<FieldRename>,
    /// Canonical keys whose object values are merged into their parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flatten: Vec<String>,
}

/// One rule: how a logical operation looks for one version band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRule {
    pub operation: String,
    pub range: VersionRange,
    pub endpoint: EndpointTemplate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter_renames: Vec<ParamRename>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<ParamTransform>,
    #[serde(default)]
    pub response: ResponseShape,
}

/// Validated, range-keyed rule table
///
/// Read-only after construction. Per-operation feature gates let the
/// manager report "requires version >= X" before rule resolution runs.
#[derive(Debug, Clone)]
pub struct RuleSet {
    bands: HashMap<String, Vec<AdaptationRule>>,
    operation_features: HashMap<String, Feature>,
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    /// Build a rule set from plain rule rows, without feature gates
    pub fn new(rules: Vec<AdaptationRule>) -> Result<Self> {
        let mut builder = Self::builder();
        for rule in rules {
            builder = builder.rule(rule);
        }
        builder.build()
    }

    /// Load a rule set from its JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(raw)?;
        let mut builder = Self::builder();
        for rule in file.rules {
            builder = builder.rule(rule);
        }
        for (operation, feature) in file.operation_features {
            builder = builder.gate(operation, feature);
        }
        builder.build()
    }

    /// Pick the rule whose range contains `version`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] naming the operation and
    /// version when no band matches.
    pub fn resolve(&self, operation: &str, version: &ApiVersion) -> Result<&AdaptationRule> {
        self.bands
            .get(operation)
            .and_then(|band| band.iter().find(|rule| rule.range.contains(version)))
            .ok_or_else(|| Error::UnsupportedOperation {
                operation: operation.to_string(),
                version: version.clone(),
            })
    }

    /// Feature gating the operation, if one was registered
    pub fn feature_for(&self, operation: &str) -> Option<Feature> {
        self.operation_features.get(operation).copied()
    }

    /// All registered (operation, feature) gates
    pub fn operation_features(&self) -> impl Iterator<Item = (&str, Feature)> {
        self.operation_features
            .iter()
            .map(|(operation, feature)| (operation.as_str(), *feature))
    }

    /// All registered operation identifiers
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    /// All bands registered for one operation, sorted by range start
    pub fn bands_for(&self, operation: &str) -> Option<&[AdaptationRule]> {
        self.bands.get(operation).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.bands.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// Serialized form of a rule table
#[derive(Debug, Serialize, Deserialize)]
struct RuleFile {
    rules: Vec<AdaptationRule>,
    #[serde(default)]
    operation_features: HashMap<String, Feature>,
}

/// Incremental construction of a [`RuleSet`]
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<AdaptationRule>,
    operation_features: HashMap<String, Feature>,
}

impl RuleSetBuilder {
    pub fn rule(mut self, rule: AdaptationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn gate(mut self, operation: impl Into<String>, feature: Feature) -> Self {
        self.operation_features.insert(operation.into(), feature);
        self
    }

    /// Validate ranges and produce the rule set
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty range, overlapping
    /// ranges, an interior gap, or a rule following an open-ended range.
    pub fn build(self) -> Result<RuleSet> {
        let mut bands: HashMap<String, Vec<AdaptationRule>> = HashMap::new();
        for rule in self.rules {
            if rule.range.is_empty() {
                return Err(Error::configuration(format!(
                    "rule for '{}' has empty range {}",
                    rule.operation, rule.range
                )));
            }
            bands.entry(rule.operation.clone()).or_default().push(rule);
        }

        for (operation, band) in &mut bands {
            band.sort_by(|a, b| a.range.min.cmp(&b.range.min));
            validate_band(operation, band)?;
        }

        Ok(RuleSet {
            bands,
            operation_features: self.operation_features,
        })
    }
}

fn validate_band(operation: &str, band: &[AdaptationRule]) -> Result<()> {
    for pair in band.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        match &prev.range.max {
            None => {
                return Err(Error::configuration(format!(
                    "rules for '{}' overlap: {} is open-ended but followed by {}",
                    operation, prev.range, next.range
                )));
            }
            Some(prev_max) => {
                if next.range.min < *prev_max {
                    return Err(Error::configuration(format!(
                        "rules for '{}' overlap: {} and {}",
                        operation, prev.range, next.range
                    )));
                }
                if next.range.min > *prev_max {
                    return Err(Error::configuration(format!(
                        "rules for '{}' leave a gap between {} and {}",
                        operation, prev.range, next.range
                    )));
                }
            }
        }
    }
    Ok(())
}
