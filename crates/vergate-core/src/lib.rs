//! Vergate Core - version-compatibility engine for a multi-revision REST API
//!
//! One client codebase, many incompatible server revisions: the engine
//! detects the live version once, caches it, and adapts logical operations
//! onto whatever endpoint/parameter/response shape that revision expects.
//!
//! # Main Components
//!
//! - **Version handling**: [`ApiVersion`] parsing and ordering, right-open
//!   [`VersionRange`]s
//! - **Detection**: [`VersionDetector`] issues one diagnostic call;
//!   [`CompatibilityManager`] caches the result with single-flight refresh
//! - **Feature matrix**: closed [`Feature`] set gated by version bounds
//! - **Adaptation rules**: range-keyed [`AdaptationRule`] tables validated
//!   at load time, applied by [`VersionAwareGateway::invoke`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vergate_core::{catalog, DetectionConfig, HttpTransport, VersionAwareGateway};
//!
//! # async fn example() -> vergate_core::Result<()> {
//! let manager = catalog::default_manager(DetectionConfig::default())?;
//! let transport = HttpTransport::new("https://play.example.org")?;
//! let gateway = VersionAwareGateway::new(Arc::new(manager), Arc::new(transport));
//!
//! let mut params = serde_json::Map::new();
//! params.insert("orgUnit".into(), "O6uvpzGd5pu".into());
//! let entities = gateway.invoke("get_tracked_entities", &params).await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod detect;
pub mod error;
pub mod features;
pub mod gateway;
pub mod manager;
pub mod rules;
pub mod transport;
pub mod version;

// Re-export main types for convenience
pub use detect::{DetectionConfig, VersionDetector};
pub use error::{Error, Result};
pub use features::{Feature, FeatureGate, FeatureMatrix};
pub use gateway::VersionAwareGateway;
pub use manager::{CachedVersion, CompatibilityManager};
pub use rules::{
    AdaptationRule, AdaptedRequest, EndpointTemplate, FieldRename, ParamRename, ParamTransform,
    ResponseShape, RuleSet, RuleSetBuilder, ValueTransform,
};
pub use transport::{
    HttpTransport, HttpTransportConfig, RetryPolicy, Transport, TransportError, TransportRequest,
    TransportResponse,
};
pub use version::{ApiVersion, VersionRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
