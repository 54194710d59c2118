//! Compatibility manager: cached version state plus the adaptation API
//!
//! The manager is the only owner of mutable state in the engine: a single
//! slot holding the last detected version. It is handed around by reference
//! (or `Arc`), never a process-wide singleton, so independent gateways can
//! coexist under test.
//!
//! State machine over the version: `Unresolved` until the first successful
//! detection, then `Resolved(version, expiry)`; refresh replaces the slot
//! but the state never reverts to `Unresolved` on its own; a stale value
//! keeps serving until an explicit refresh succeeds.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::detect::{DetectionConfig, VersionDetector};
use crate::error::{Error, Result};
use crate::features::{Feature, FeatureMatrix};
use crate::rules::{adapter, response, AdaptedRequest, RuleSet};
use crate::transport::Transport;
use crate::version::ApiVersion;

/// A detected version with its freshness window
#[derive(Debug, Clone)]
pub struct CachedVersion {
    pub version: ApiVersion,
    pub detected_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CachedVersion {
    pub fn new(version: ApiVersion, detected_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            version,
            detected_at,
            ttl,
        }
    }

    /// Freshness at an explicit instant, so expiry is testable without a clock
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.detected_at) < self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

/// Owns the cached detected version and answers compatibility questions
pub struct CompatibilityManager {
    config: DetectionConfig,
    matrix: FeatureMatrix,
    rules: RuleSet,
    // The only shared mutable state. The whole CachedVersion is swapped as a
    // unit under the write lock; readers never see a partial entry.
    cache: RwLock<Option<CachedVersion>>,
    // Serializes detection so concurrent callers trigger at most one
    // diagnostic call. Readers of `cache` never touch this lock.
    detect_gate: Mutex<()>,
}

impl CompatibilityManager {
    /// Wire a manager from its read-only tables
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a rule set gates an operation
    /// on a feature the matrix has no row for; an inconsistency between
    /// the two tables must fail here, not on the first request.
    pub fn new(config: DetectionConfig, matrix: FeatureMatrix, rules: RuleSet) -> Result<Self> {
        for (operation, feature) in rules.operation_features() {
            if matrix.gate(feature).is_none() {
                return Err(Error::configuration(format!(
                    "operation '{}' is gated on feature '{}', which has no row in the matrix",
                    operation, feature
                )));
            }
        }
        Ok(Self {
            config,
            matrix,
            rules,
            cache: RwLock::new(None),
            detect_gate: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn matrix(&self) -> &FeatureMatrix {
        &self.matrix
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The cached version, fresh or stale, without touching the network
    pub fn cached_version(&self) -> Option<ApiVersion> {
        self.cache.read().as_ref().map(|c| c.version.clone())
    }

    fn fresh_version(&self) -> Option<ApiVersion> {
        self.cache
            .read()
            .as_ref()
            .filter(|c| c.is_fresh())
            .map(|c| c.version.clone())
    }

    fn store(&self, version: ApiVersion) {
        let entry = CachedVersion::new(version, Utc::now(), self.config.cache_ttl());
        *self.cache.write() = Some(entry);
    }

    /// Return the cached version, detecting it first when missing or expired
    ///
    /// Concurrent callers observe at most one in-flight detection and share
    /// its result. Detection failure degrades: a stale cached value keeps
    /// serving, and with nothing cached the configured default is returned
    /// (uncached, so the next call retries detection).
    pub async fn ensure_version(&self, transport: &dyn Transport) -> Result<ApiVersion> {
        if let Some(version) = self.fresh_version() {
            return Ok(version);
        }

        let _gate = self.detect_gate.lock().await;
        // Another caller may have finished detection while we waited.
        if let Some(version) = self.fresh_version() {
            return Ok(version);
        }

        match VersionDetector::detect(transport, &self.config).await {
            Ok(version) => {
                self.store(version.clone());
                tracing::info!(%version, "detected server version");
                Ok(version)
            }
            Err(error) => {
                if let Some(stale) = self.cached_version() {
                    tracing::warn!(
                        %error,
                        version = %stale,
                        "version detection failed, serving stale cached version"
                    );
                    Ok(stale)
                } else {
                    let fallback = self.config.default_version.clone();
                    tracing::warn!(
                        %error,
                        %fallback,
                        "version detection failed, falling back to configured default"
                    );
                    Ok(fallback)
                }
            }
        }
    }

    /// Force re-detection, bypassing the cache
    ///
    /// On failure the prior cache entry stays intact and the detection error
    /// is surfaced.
    pub async fn refresh(&self, transport: &dyn Transport) -> Result<ApiVersion> {
        let _gate = self.detect_gate.lock().await;
        let version = VersionDetector::detect(transport, &self.config).await?;
        self.store(version.clone());
        tracing::info!(%version, "refreshed server version");
        Ok(version)
    }

    /// Is `feature` available on the live server?
    pub async fn is_feature_supported(
        &self,
        transport: &dyn Transport,
        feature: Feature,
    ) -> Result<bool> {
        let version = self.ensure_version(transport).await?;
        Ok(self.matrix.is_supported(feature, &version))
    }

    /// Resolve the version and fail with the feature's minimum bound when it
    /// is not available
    pub async fn require_feature(
        &self,
        transport: &dyn Transport,
        feature: Feature,
    ) -> Result<ApiVersion> {
        let version = self.ensure_version(transport).await?;
        self.check_feature(feature, &version)?;
        Ok(version)
    }

    fn check_feature(&self, feature: Feature, version: &ApiVersion) -> Result<()> {
        if self.matrix.is_supported(feature, version) {
            return Ok(());
        }
        // Construction validated that gated features have matrix rows, so a
        // missing gate here means the feature was queried directly.
        match self.matrix.gate(feature) {
            Some(gate) => Err(Error::FeatureNotSupported {
                feature,
                version: version.clone(),
                required: gate.introduced_at.clone(),
            }),
            None => Err(Error::configuration(format!(
                "feature '{}' has no row in the matrix",
                feature
            ))),
        }
    }

    /// Adapt a logical operation for the live server version
    pub async fn adapt(
        &self,
        transport: &dyn Transport,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<AdaptedRequest> {
        let version = self.ensure_version(transport).await?;
        self.adapt_at(&version, operation, params)
    }

    /// Pure adaptation against an explicit version
    ///
    /// The operation's feature gate is checked before rule resolution, so a
    /// gated-but-unsupported feature reports its minimum version instead of
    /// a bare missing-rule error.
    pub fn adapt_at(
        &self,
        version: &ApiVersion,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<AdaptedRequest> {
        if let Some(feature) = self.rules.feature_for(operation) {
            self.check_feature(feature, version)?;
        }
        let rule = self.rules.resolve(operation, version)?;
        tracing::debug!(
            operation,
            %version,
            endpoint = %rule.endpoint.path,
            "resolved adaptation rule"
        );
        adapter::adapt_request(rule, version, params)
    }

    /// Map a raw response for `operation` back to the canonical shape
    pub async fn adapt_response(
        &self,
        transport: &dyn Transport,
        operation: &str,
        raw: &Value,
    ) -> Result<Value> {
        let version = self.ensure_version(transport).await?;
        self.adapt_response_at(&version, operation, raw)
    }

    /// Pure response adaptation against an explicit version
    pub fn adapt_response_at(
        &self,
        version: &ApiVersion,
        operation: &str,
        raw: &Value,
    ) -> Result<Value> {
        let rule = self.rules.resolve(operation, version)?;
        Ok(response::adapt_response(&rule.response, raw))
    }
}
