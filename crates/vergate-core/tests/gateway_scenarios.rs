//! End-to-end scenarios over the built-in catalog: one gateway, a scripted
//! transport, and the full adapt → send → adapt-back path

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use vergate_core::{
    catalog, ApiVersion, DetectionConfig, Error, Feature, Transport, TransportError,
    TransportRequest, TransportResponse, VersionAwareGateway,
};

/// Serves the diagnostic endpoint with a fixed version and every other
/// endpoint from a canned table, recording what it was asked.
struct ScriptedServer {
    version: &'static str,
    replies: Vec<(&'static str, Value)>,
    seen: Mutex<Vec<TransportRequest>>,
}

impl ScriptedServer {
    fn new(version: &'static str, replies: Vec<(&'static str, Value)>) -> Self {
        Self {
            version,
            replies,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        if request.endpoint == "/api/system/info" {
            return Ok(TransportResponse::new(
                200,
                json!({ "version": self.version, "revision": "deadbeef" }),
            ));
        }
        let endpoint = request.endpoint.clone();
        self.seen.lock().push(request);
        match self.replies.iter().find(|(path, _)| *path == endpoint) {
            Some((_, body)) => Ok(TransportResponse::new(200, body.clone())),
            None => Err(TransportError::Status {
                endpoint,
                status: 404,
                body: None,
            }),
        }
    }
}

fn gateway_against(server: Arc<ScriptedServer>) -> VersionAwareGateway {
    let manager = catalog::default_manager(DetectionConfig::default()).unwrap();
    VersionAwareGateway::new(Arc::new(manager), server)
}

fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn legacy_revision_gets_legacy_shape_and_canonical_response() {
    let server = Arc::new(ScriptedServer::new(
        "2.36.1",
        vec![(
            "/api/trackedEntityInstances",
            json!({
                "trackedEntityInstances": [
                    { "trackedEntityInstance": "te1", "created": "2024-01-01" }
                ]
            }),
        )],
    ));
    let gateway = gateway_against(server.clone());

    let canonical = gateway
        .invoke(
            "get_tracked_entities",
            &params(&[("orgUnit", json!("O6uvpzGd5pu"))]),
        )
        .await
        .unwrap();

    let record = &canonical["trackedEntityInstances"][0];
    assert_eq!(record["trackedEntity"], json!("te1"));
    assert_eq!(record["createdAt"], json!("2024-01-01"));

    let seen = server.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].endpoint, "/api/trackedEntityInstances");
    assert_eq!(seen[0].params.get("ou"), Some(&json!("O6uvpzGd5pu")));
}

#[tokio::test]
async fn modern_revision_gets_tracker_shape_with_transformed_params() {
    let server = Arc::new(ScriptedServer::new(
        "2.40.3.1",
        vec![("/api/tracker/trackedEntities", json!({ "instances": [] }))],
    ));
    let gateway = gateway_against(server.clone());

    gateway
        .invoke(
            "get_tracked_entities",
            &params(&[("orgUnit", json!("a;b;c"))]),
        )
        .await
        .unwrap();

    let seen = server.requests();
    assert_eq!(seen[0].endpoint, "/api/tracker/trackedEntities");
    assert_eq!(seen[0].params.get("orgUnits"), Some(&json!("a,b,c")));
}

#[tokio::test]
async fn removed_operation_fails_without_touching_the_network() {
    let server = Arc::new(ScriptedServer::new("2.40.0", vec![]));
    let gateway = gateway_against(server.clone());

    let err = gateway.invoke("get_charts", &Map::new()).await.unwrap_err();
    match err {
        Error::UnsupportedOperation { operation, version } => {
            assert_eq!(operation, "get_charts");
            assert_eq!(version, ApiVersion::new(2, 40, 0));
        }
        other => panic!("expected UnsupportedOperation, got {other:?}"),
    }
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn gated_operation_reports_required_version() {
    let server = Arc::new(ScriptedServer::new("2.38.0", vec![]));
    let gateway = gateway_against(server.clone());

    let err = gateway
        .invoke("run_data_exchange", &params(&[("id", json!("ex01"))]))
        .await
        .unwrap_err();
    match err {
        Error::FeatureNotSupported {
            feature, required, ..
        } => {
            assert_eq!(feature, Feature::AggregateDataExchange);
            assert_eq!(required, ApiVersion::new(2, 39, 0));
        }
        other => panic!("expected FeatureNotSupported, got {other:?}"),
    }
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn placeholder_endpoints_consume_their_params() {
    let server = Arc::new(ScriptedServer::new(
        "2.40.0",
        vec![("/api/aggregateDataExchanges/ex01/exchange", json!({ "status": "OK" }))],
    ));
    let gateway = gateway_against(server.clone());

    let result = gateway
        .invoke(
            "run_data_exchange",
            &params(&[("id", json!("ex01")), ("dryRun", json!(true))]),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], json!("OK"));

    let seen = server.requests();
    assert_eq!(seen[0].endpoint, "/api/aggregateDataExchanges/ex01/exchange");
    assert!(seen[0].params.get("id").is_none());
    assert_eq!(seen[0].params.get("dryRun"), Some(&json!("true")));
}

#[tokio::test]
async fn credentials_sub_object_flattens_into_user_records() {
    let server = Arc::new(ScriptedServer::new(
        "2.39.0",
        vec![(
            "/api/users",
            json!({
                "users": [
                    { "id": "u1", "userCredentials": { "username": "ada", "disabled": false } }
                ]
            }),
        )],
    ));
    let gateway = gateway_against(server);

    let canonical = gateway.invoke("get_users", &Map::new()).await.unwrap();
    assert_eq!(canonical["users"][0]["username"], json!("ada"));
    assert_eq!(canonical["users"][0]["disabled"], json!(false));
    assert!(canonical["users"][0].get("userCredentials").is_none());
}

/// Forward parameter renames and reverse response renames are inverses: a
/// server echoing the remote field names hands callers back their canonical
/// names.
#[tokio::test]
async fn rename_tables_are_invertible() {
    let server = Arc::new(ScriptedServer::new(
        "2.36.0",
        vec![(
            "/api/trackedEntityInstances",
            json!({ "trackedEntityInstance": "te9" }),
        )],
    ));
    let gateway = gateway_against(server.clone());

    let canonical = gateway
        .invoke(
            "get_tracked_entities",
            &params(&[("trackedEntity", json!("te9"))]),
        )
        .await
        .unwrap();

    // Canonical name went in, remote name crossed the wire, canonical name
    // came back out.
    let seen = server.requests();
    assert_eq!(
        seen[0].params.get("trackedEntityInstance"),
        Some(&json!("te9"))
    );
    assert_eq!(canonical["trackedEntity"], json!("te9"));
}

#[tokio::test]
async fn one_detection_serves_many_invokes() {
    let server = Arc::new(ScriptedServer::new(
        "2.40.0",
        vec![
            ("/api/tracker/trackedEntities", json!({})),
            ("/api/tracker/events", json!({})),
        ],
    ));
    let gateway = gateway_against(server.clone());

    gateway
        .invoke("get_tracked_entities", &Map::new())
        .await
        .unwrap();
    gateway.invoke("get_events", &Map::new()).await.unwrap();

    // Two operation requests recorded; the diagnostic endpoint is not
    // recorded, but a second detection would have been visible as a changed
    // version. Assert via the cached version instead.
    assert_eq!(server.requests().len(), 2);
    assert_eq!(
        gateway.manager().cached_version(),
        Some(ApiVersion::new(2, 40, 0))
    );
}
