//! Live version detection via the diagnostic endpoint
//!
//! One read-only request against a well-known path, a field lookup in the
//! JSON body, one parse. Both the path and the field name are configuration;
//! nothing here is hard-coded to a particular server layout.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportRequest};
use crate::version::ApiVersion;

/// Where and how to learn the live server version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Read-only diagnostic path
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Dot-separated field holding the version string in the response body
    #[serde(default = "default_version_field")]
    pub version_field: String,
    /// Served when detection fails and nothing is cached
    pub default_version: ApiVersion,
    /// How long a detected version stays fresh
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_endpoint() -> String {
    "/api/system/info".to_string()
}

fn default_version_field() -> String {
    "version".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            version_field: default_version_field(),
            default_version: ApiVersion::new(2, 39, 0),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl DetectionConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }
}

/// Issues the diagnostic call and parses the reported version
pub struct VersionDetector;

impl VersionDetector {
    /// Learn the live server version
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detection`] on transport failure, a non-success
    /// status, a missing version field, or an unparsable version value.
    /// Callers fall back to `config.default_version` rather than failing
    /// traffic outright.
    pub async fn detect(transport: &dyn Transport, config: &DetectionConfig) -> Result<ApiVersion> {
        tracing::debug!(endpoint = %config.endpoint, "sending diagnostic request");

        let response = transport
            .send(TransportRequest::get(&config.endpoint))
            .await
            .map_err(|e| Error::Detection {
                message: format!("diagnostic request to {} failed", config.endpoint),
                source: Some(anyhow::Error::new(e)),
            })?;

        if !response.is_success() {
            return Err(Error::Detection {
                message: format!(
                    "diagnostic endpoint {} returned status {}",
                    config.endpoint, response.status
                ),
                source: None,
            });
        }

        let field = extract_field(&response.body, &config.version_field).ok_or_else(|| {
            Error::Detection {
                message: format!(
                    "diagnostic response has no '{}' field",
                    config.version_field
                ),
                source: None,
            }
        })?;

        let raw = field.as_str().ok_or_else(|| Error::Detection {
            message: format!(
                "diagnostic field '{}' is not a string: {}",
                config.version_field, field
            ),
            source: None,
        })?;

        let version = ApiVersion::parse(raw).map_err(|e| Error::Detection {
            message: format!("diagnostic field '{}' is unparsable", config.version_field),
            source: Some(anyhow::Error::new(e)),
        })?;

        tracing::debug!(%version, "diagnostic request succeeded");
        Ok(version)
    }
}

fn extract_field<'a>(body: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(body, |acc, key| acc.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedTransport {
        response: std::result::Result<TransportResponse, ()>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(()) => Err(TransportError::Request {
                    endpoint: request.endpoint,
                    message: "connection refused".to_string(),
                    source: None,
                }),
            }
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            default_version: ApiVersion::new(2, 39, 0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_detect_parses_reported_version() {
        let transport = CannedTransport {
            response: Ok(TransportResponse::new(
                200,
                json!({ "version": "2.40.3.1", "revision": "cafe123" }),
            )),
        };
        let version = VersionDetector::detect(&transport, &config()).await.unwrap();
        assert_eq!(version, ApiVersion::new(2, 40, 3));
        assert_eq!(version.suffix(), Some(".1"));
    }

    #[tokio::test]
    async fn test_detect_supports_dotted_field() {
        let transport = CannedTransport {
            response: Ok(TransportResponse::new(
                200,
                json!({ "system": { "version": "2.38" } }),
            )),
        };
        let mut config = config();
        config.version_field = "system.version".to_string();
        let version = VersionDetector::detect(&transport, &config).await.unwrap();
        assert_eq!(version, ApiVersion::new(2, 38, 0));
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_detection_error() {
        let transport = CannedTransport { response: Err(()) };
        let err = VersionDetector::detect(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, Error::Detection { .. }));
    }

    #[tokio::test]
    async fn test_missing_field_becomes_detection_error() {
        let transport = CannedTransport {
            response: Ok(TransportResponse::new(200, json!({ "revision": "abc" }))),
        };
        let err = VersionDetector::detect(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, Error::Detection { .. }));
    }

    #[tokio::test]
    async fn test_unparsable_version_becomes_detection_error() {
        let transport = CannedTransport {
            response: Ok(TransportResponse::new(200, json!({ "version": "unknown" }))),
        };
        let err = VersionDetector::detect(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, Error::Detection { .. }));
    }

    #[tokio::test]
    async fn test_error_status_becomes_detection_error() {
        let transport = CannedTransport {
            response: Ok(TransportResponse::new(503, json!({}))),
        };
        let err = VersionDetector::detect(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, Error::Detection { .. }));
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.endpoint, "/api/system/info");
        assert_eq!(config.version_field, "version");
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.cache_ttl(), chrono::Duration::minutes(5));
    }
}
