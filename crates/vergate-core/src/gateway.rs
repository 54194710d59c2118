//! Version-aware gateway: the public entry point for issuing logical calls
//!
//! `invoke` adapts first and aborts before any network traffic when
//! adaptation fails; transport errors pass through verbatim; successful
//! bodies are mapped back using the response shape captured at adapt time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::features::Feature;
use crate::manager::CompatibilityManager;
use crate::rules::{response, AdaptedRequest};
use crate::transport::{Transport, TransportError, TransportRequest};
use crate::version::ApiVersion;

/// Public entry point: adapt, send, adapt back
///
/// Holds its manager by `Arc` so several gateways (or a gateway plus
/// background refresh logic) can share one version cache.
pub struct VersionAwareGateway {
    manager: Arc<CompatibilityManager>,
    transport: Arc<dyn Transport>,
}

impl VersionAwareGateway {
    pub fn new(manager: Arc<CompatibilityManager>, transport: Arc<dyn Transport>) -> Self {
        Self { manager, transport }
    }

    pub fn manager(&self) -> &CompatibilityManager {
        &self.manager
    }

    /// Issue a logical operation against the live server
    ///
    /// # Errors
    ///
    /// Adaptation failures ([`Error::UnsupportedOperation`],
    /// [`Error::FeatureNotSupported`], [`Error::Validation`]) abort before
    /// any network call. Transport failures surface as [`Error::Transport`]
    /// unchanged. The response is mapped with the same rule that shaped the
    /// request.
    pub async fn invoke(&self, operation: &str, params: &Map<String, Value>) -> Result<Value> {
        let adapted = self
            .manager
            .adapt(self.transport.as_ref(), operation, params)
            .await?;
        self.dispatch(operation, adapted).await
    }

    async fn dispatch(&self, operation: &str, adapted: AdaptedRequest) -> Result<Value> {
        tracing::debug!(
            operation,
            version = %adapted.version,
            method = %adapted.method,
            endpoint = %adapted.endpoint,
            "dispatching adapted request"
        );

        let request = TransportRequest {
            method: adapted.method,
            endpoint: adapted.endpoint.clone(),
            params: adapted.params,
            headers: HashMap::new(),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(Error::Transport)?;

        if !response.is_success() {
            return Err(Error::Transport(TransportError::Status {
                endpoint: adapted.endpoint,
                status: response.status,
                body: serde_json::to_string(&response.body).ok(),
            }));
        }

        Ok(response::adapt_response(&adapted.response, &response.body))
    }

    /// The version the gateway is currently adapting against
    pub async fn version(&self) -> Result<ApiVersion> {
        self.manager.ensure_version(self.transport.as_ref()).await
    }

    /// Force re-detection, bypassing the cache
    pub async fn refresh_version(&self) -> Result<ApiVersion> {
        self.manager.refresh(self.transport.as_ref()).await
    }

    /// Is `feature` available on the live server?
    pub async fn is_feature_supported(&self, feature: Feature) -> Result<bool> {
        self.manager
            .is_feature_supported(self.transport.as_ref(), feature)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionConfig;
    use crate::features::FeatureMatrix;
    use crate::rules::{
        AdaptationRule, EndpointTemplate, FieldRename, ParamRename, ParamTransform, ResponseShape,
        RuleSet, ValueTransform,
    };
    use crate::transport::TransportResponse;
    use crate::version::VersionRange;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Replies to the diagnostic path with a fixed version and records every
    /// other request, answering it with a canned body (or a canned failure).
    struct RecordingTransport {
        version: &'static str,
        reply: Value,
        fail_operations: bool,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl RecordingTransport {
        fn new(version: &'static str, reply: Value) -> Self {
            Self {
                version,
                reply,
                fail_operations: false,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(version: &'static str) -> Self {
            Self {
                version,
                reply: Value::Null,
                fail_operations: true,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<TransportRequest> {
            self.seen.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            if request.endpoint == "/api/system/info" {
                return Ok(TransportResponse::new(
                    200,
                    json!({ "version": self.version }),
                ));
            }
            let endpoint = request.endpoint.clone();
            self.seen.lock().push(request);
            if self.fail_operations {
                return Err(TransportError::Status {
                    endpoint,
                    status: 502,
                    body: None,
                });
            }
            Ok(TransportResponse::new(200, self.reply.clone()))
        }
    }

    fn create_test_gateway(
        transport: Arc<RecordingTransport>,
    ) -> VersionAwareGateway {
        let rules = RuleSet::builder()
            .rule(AdaptationRule {
                operation: "get_tracked_entities".to_string(),
                range: VersionRange::bounded(ApiVersion::new(2, 35, 0), ApiVersion::new(2, 38, 0)),
                endpoint: EndpointTemplate::get("/api/trackedEntityInstances"),
                parameter_renames: vec![ParamRename::new("orgUnit", "ou")],
                transforms: vec![],
                response: ResponseShape {
                    field_renames: vec![FieldRename::new("trackedEntityInstance", "trackedEntity")],
                    flatten: vec![],
                },
            })
            .rule(AdaptationRule {
                operation: "get_tracked_entities".to_string(),
                range: VersionRange::bounded(ApiVersion::new(2, 38, 0), ApiVersion::new(2, 42, 0)),
                endpoint: EndpointTemplate::get("/api/tracker/trackedEntities"),
                parameter_renames: vec![ParamRename::new("orgUnit", "orgUnits")],
                transforms: vec![ParamTransform::new(
                    "orgUnit",
                    ValueTransform::SemicolonToCommaList,
                )],
                response: ResponseShape::default(),
            })
            .build()
            .unwrap();

        let manager = CompatibilityManager::new(
            DetectionConfig::default(),
            FeatureMatrix::new(vec![]).unwrap(),
            rules,
        )
        .unwrap();
        VersionAwareGateway::new(Arc::new(manager), transport)
    }

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_invoke_adapts_request_and_response() {
        let transport = Arc::new(RecordingTransport::new(
            "2.36.0",
            json!({ "trackedEntityInstance": "te1", "orgUnit": "ou1" }),
        ));
        let gateway = create_test_gateway(transport.clone());

        let canonical = gateway
            .invoke("get_tracked_entities", &params(&[("orgUnit", json!("ou1"))]))
            .await
            .unwrap();
        assert_eq!(canonical["trackedEntity"], json!("te1"));

        let seen = transport.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].endpoint, "/api/trackedEntityInstances");
        assert_eq!(seen[0].params.get("ou"), Some(&json!("ou1")));
        assert!(seen[0].params.get("orgUnit").is_none());
    }

    #[tokio::test]
    async fn test_invoke_sends_version_specific_shape() {
        let transport = Arc::new(RecordingTransport::new("2.40.0", json!({ "instances": [] })));
        let gateway = create_test_gateway(transport.clone());

        gateway
            .invoke(
                "get_tracked_entities",
                &params(&[("orgUnit", json!("a;b;c"))]),
            )
            .await
            .unwrap();

        let seen = transport.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].endpoint, "/api/tracker/trackedEntities");
        assert_eq!(seen[0].params.get("orgUnits"), Some(&json!("a,b,c")));
    }

    #[tokio::test]
    async fn test_unadaptable_invoke_never_reaches_transport() {
        let transport = Arc::new(RecordingTransport::new("2.43.0", json!({})));
        let gateway = create_test_gateway(transport.clone());

        let err = gateway
            .invoke("get_tracked_entities", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let transport = Arc::new(RecordingTransport::failing("2.40.0"));
        let gateway = create_test_gateway(transport.clone());

        let err = gateway
            .invoke("get_tracked_entities", &Map::new())
            .await
            .unwrap_err();
        match err {
            Error::Transport(TransportError::Status { status, .. }) => assert_eq!(status, 502),
            other => panic!("expected transport status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_version_bypasses_cache() {
        let transport = Arc::new(RecordingTransport::new("2.40.0", json!({})));
        let gateway = create_test_gateway(transport.clone());

        assert_eq!(gateway.version().await.unwrap(), ApiVersion::new(2, 40, 0));
        let refreshed = gateway.refresh_version().await.unwrap();
        assert_eq!(refreshed, ApiVersion::new(2, 40, 0));
    }
}
