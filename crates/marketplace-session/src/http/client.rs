/*
[INPUT]:  HTTP configuration (base URL, timeouts)
[OUTPUT]: Configured reqwest client and envelope-aware send helpers
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing envelope handling
*/

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{Result, SessionError};
use crate::types::ApiEnvelope;

/// Default backend base URL
const DEFAULT_API_BASE_URL: &str = "http://localhost:4000/api/";
const ERROR_BODY_MAX_BYTES: usize = 256;

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// HTTP client for the marketplace auth backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: parse_base_url(&config.api_base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build full URL; endpoints are resolved relative to the base path
    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.url(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Send and unwrap `data` from a `{success, data, error}` envelope
    pub(crate) async fn send_envelope<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T> {
        let envelope = self.read_envelope::<T>(builder).await?;
        envelope
            .data
            .ok_or_else(|| SessionError::InvalidResponse("response envelope missing data".to_string()))
    }

    /// Send and only check the envelope's `success` flag
    pub(crate) async fn send_ack(&self, builder: RequestBuilder) -> Result<()> {
        self.read_envelope::<serde_json::Value>(builder).await?;
        Ok(())
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<ApiEnvelope<T>> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), body_len = body.len(), "auth backend response");

        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(SessionError::api_error(status, None, truncate(&body)));
            }
            Err(err) => return Err(err.into()),
        };

        if !status.is_success() || !envelope.success {
            let (code, message) = match &envelope.error {
                Some(error) => (error.code().map(str::to_string), error.message().to_string()),
                None => (None, format!("request failed with status {status}")),
            };
            return Err(SessionError::api_error(status, code, message));
        }

        Ok(envelope)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SessionError::Config("api_base_url must not be empty".to_string()));
    }
    // Url::join drops the last path segment unless the base ends with '/'
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{raw}/"))?)
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= ERROR_BODY_MAX_BYTES {
        return body.to_string();
    }
    let mut end = ERROR_BODY_MAX_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::NonceData;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let client = ApiClient::with_config(ClientConfig::with_base_url("http://example.com/api"))
            .unwrap();
        assert_eq!(
            client.url("/auth/login").unwrap().as_str(),
            "http://example.com/api/auth/login"
        );
    }

    #[test]
    fn test_empty_base_url_is_config_error() {
        let err = ApiClient::with_config(ClientConfig::with_base_url("  ")).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[tokio::test]
    async fn test_envelope_success_false_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/wallet/nonce"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": {"code": "NONCE_INVALID", "message": "unknown address"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::with_config(ClientConfig::with_base_url(server.uri())).unwrap();
        let builder = client.request(Method::GET, "/auth/wallet/nonce").unwrap();
        let err = client.send_envelope::<NonceData>(builder).await.unwrap_err();

        match err {
            SessionError::Api { status, code, message } => {
                assert_eq!(status, 200);
                assert_eq!(code.as_deref(), Some("NONCE_INVALID"));
                assert_eq!(message, "unknown address");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/google/url"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ApiClient::with_config(ClientConfig::with_base_url(server.uri())).unwrap();
        let builder = client.request(Method::GET, "/auth/google/url").unwrap();
        let err = client
            .send_envelope::<serde_json::Value>(builder)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("bad gateway"));
    }
}
