//! Built-in rule table and feature gates for the supported platform
//! revisions (2.35 through 2.41)
//!
//! This is the data the rest of the engine treats as configuration: which
//! feature appeared when, and how each logical operation looks per version
//! band. Deployments tracking a newer server can replace or extend it from
//! a JSON file via [`load_rules`].

use std::path::Path;

use crate::detect::DetectionConfig;
use crate::error::Result;
use crate::features::{Feature, FeatureGate, FeatureMatrix};
use crate::manager::CompatibilityManager;
use crate::rules::{
    AdaptationRule, EndpointTemplate, FieldRename, ParamRename, ParamTransform, ResponseShape,
    RuleSet, ValueTransform,
};
use crate::version::{ApiVersion, VersionRange};

/// Oldest revision the built-in catalog covers
pub fn min_supported() -> ApiVersion {
    ApiVersion::new(2, 35, 0)
}

/// Newest revision the built-in catalog was verified against
pub fn max_supported() -> ApiVersion {
    ApiVersion::new(2, 41, 0)
}

/// Canonical gate rows, one per feature
pub fn default_feature_gates() -> Vec<FeatureGate> {
    vec![
        FeatureGate::bounded(
            Feature::LegacyTrackerApi,
            ApiVersion::new(2, 30, 0),
            ApiVersion::new(2, 41, 0),
        ),
        FeatureGate::introduced(Feature::NewTrackerApi, ApiVersion::new(2, 38, 0)),
        FeatureGate::introduced(Feature::WorkingLists, ApiVersion::new(2, 37, 0)),
        FeatureGate::introduced(Feature::AggregateDataExchange, ApiVersion::new(2, 39, 0)),
        FeatureGate::introduced(Feature::VisualizationsApi, ApiVersion::new(2, 35, 0)),
        FeatureGate::introduced(Feature::ContinuousAnalytics, ApiVersion::new(2, 36, 0)),
    ]
}

/// The built-in feature matrix
pub fn default_matrix() -> Result<FeatureMatrix> {
    FeatureMatrix::new(default_feature_gates())
}

/// The built-in rule table
pub fn default_rules() -> Result<RuleSet> {
    let legacy_band = VersionRange::bounded(min_supported(), ApiVersion::new(2, 38, 0));
    let tracker_band = VersionRange::from(ApiVersion::new(2, 38, 0));

    RuleSet::builder()
        // Tracked entities moved from /api/trackedEntityInstances to the
        // consolidated tracker endpoints in 2.38, renaming most fields.
        .rule(AdaptationRule {
            operation: "get_tracked_entities".to_string(),
            range: legacy_band.clone(),
            endpoint: EndpointTemplate::get("/api/trackedEntityInstances"),
            parameter_renames: vec![
                ParamRename::new("orgUnit", "ou"),
                ParamRename::new("trackedEntity", "trackedEntityInstance"),
            ],
            transforms: vec![],
            response: ResponseShape {
                field_renames: vec![
                    FieldRename::new("trackedEntityInstance", "trackedEntity"),
                    FieldRename::new("created", "createdAt"),
                    FieldRename::new("lastUpdated", "updatedAt"),
                ],
                flatten: vec![],
            },
        })
        .rule(AdaptationRule {
            operation: "get_tracked_entities".to_string(),
            range: tracker_band.clone(),
            endpoint: EndpointTemplate::get("/api/tracker/trackedEntities"),
            parameter_renames: vec![ParamRename::new("orgUnit", "orgUnits")],
            transforms: vec![ParamTransform::new(
                "orgUnit",
                ValueTransform::SemicolonToCommaList,
            )],
            response: ResponseShape::default(),
        })
        .rule(AdaptationRule {
            operation: "create_tracked_entity".to_string(),
            range: legacy_band.clone(),
            endpoint: EndpointTemplate::post("/api/trackedEntityInstances"),
            parameter_renames: vec![ParamRename::new("trackedEntity", "trackedEntityInstance")],
            transforms: vec![],
            response: ResponseShape {
                field_renames: vec![FieldRename::new("trackedEntityInstance", "trackedEntity")],
                flatten: vec![],
            },
        })
        .rule(AdaptationRule {
            operation: "create_tracked_entity".to_string(),
            range: tracker_band.clone(),
            endpoint: EndpointTemplate::post("/api/tracker"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        // Events: the legacy resource spoke in eventDate/startDate terms.
        .rule(AdaptationRule {
            operation: "get_events".to_string(),
            range: legacy_band.clone(),
            endpoint: EndpointTemplate::get("/api/events"),
            parameter_renames: vec![
                ParamRename::new("occurredAfter", "startDate"),
                ParamRename::new("occurredBefore", "endDate"),
            ],
            transforms: vec![],
            response: ResponseShape {
                field_renames: vec![
                    FieldRename::new("eventDate", "occurredAt"),
                    FieldRename::new("trackedEntityInstance", "trackedEntity"),
                ],
                flatten: vec![],
            },
        })
        .rule(AdaptationRule {
            operation: "get_events".to_string(),
            range: tracker_band,
            endpoint: EndpointTemplate::get("/api/tracker/events"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        // Users carried a credentials sub-object until 2.41 merged it into
        // the user record itself.
        .rule(AdaptationRule {
            operation: "get_users".to_string(),
            range: VersionRange::bounded(min_supported(), ApiVersion::new(2, 41, 0)),
            endpoint: EndpointTemplate::get("/api/users"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape {
                field_renames: vec![],
                flatten: vec!["userCredentials".to_string()],
            },
        })
        .rule(AdaptationRule {
            operation: "get_users".to_string(),
            range: VersionRange::from(ApiVersion::new(2, 41, 0)),
            endpoint: EndpointTemplate::get("/api/users"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        .rule(AdaptationRule {
            operation: "get_working_lists".to_string(),
            range: VersionRange::from(ApiVersion::new(2, 37, 0)),
            endpoint: EndpointTemplate::get("/api/trackedEntityInstanceFilters"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        .rule(AdaptationRule {
            operation: "run_data_exchange".to_string(),
            range: VersionRange::from(ApiVersion::new(2, 39, 0)),
            endpoint: EndpointTemplate::post("/api/aggregateDataExchanges/{id}/exchange"),
            parameter_renames: vec![],
            transforms: vec![ParamTransform::new("dryRun", ValueTransform::StringifyBool)],
            response: ResponseShape::default(),
        })
        .rule(AdaptationRule {
            operation: "get_visualizations".to_string(),
            range: VersionRange::from(min_supported()),
            endpoint: EndpointTemplate::get("/api/visualizations"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        // Charts were folded into visualizations in 2.37; no band past that
        // models the hard removal.
        .rule(AdaptationRule {
            operation: "get_charts".to_string(),
            range: VersionRange::bounded(min_supported(), ApiVersion::new(2, 37, 0)),
            endpoint: EndpointTemplate::get("/api/charts"),
            parameter_renames: vec![],
            transforms: vec![],
            response: ResponseShape::default(),
        })
        .gate("get_working_lists", Feature::WorkingLists)
        .gate("run_data_exchange", Feature::AggregateDataExchange)
        .gate("get_visualizations", Feature::VisualizationsApi)
        .build()
}

/// A manager wired with the built-in catalog
pub fn default_manager(config: DetectionConfig) -> Result<CompatibilityManager> {
    CompatibilityManager::new(config, default_matrix()?, default_rules()?)
}

/// Load a rule table from a JSON file, replacing the built-in one
pub fn load_rules(path: &Path) -> Result<RuleSet> {
    let raw = std::fs::read_to_string(path)?;
    RuleSet::from_json(&raw)
}
