//! # Ghost Pass API
//!
//! HTTP client for the Ghost Pass issuer and verifier functions.
//!
//! The functions are plain JSON over HTTPS. Calls carry the signed-in
//! session as a bearer credential; the public key endpoint is open.
//!
//! ## Endpoints
//!
//! - `POST issue_token`: `{subject_id, permissions}` to `{token, expires_at, issued_at?}`
//! - `POST verify_token`: `{token, profile?, format}` to `{result, reason?, attributes?}`
//! - `GET public_key`: `{public_key}`

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use ghostpass_config::GhostPassConfig;

/// Default timeout applied to every request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Error type for the API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("SSL configuration error: {0}")]
    SslConfig(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token request error: {0}")]
    TokenRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// True when the request never produced an authoritative answer:
    /// connection failures, timeouts, server errors and unreadable bodies.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::HttpClient(_) | ApiError::InvalidResponse(_))
    }
}

// Request and response structures
/// Request payload for issuing a pass token
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    pub subject_id: String,
    pub permissions: BTreeMap<String, bool>,
}

/// Response from the issuer function
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueTokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<i64>,
    #[serde(default, alias = "issuedAt")]
    pub issued_at: Option<i64>,
    /// Explanation when no token was issued
    #[serde(default, alias = "error", alias = "message")]
    pub response_msg: Option<String>,
}

/// A token the issuer handed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub expires_at: i64,
    pub issued_at: Option<i64>,
}

/// Request payload for verifying a scanned token
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// `structured` or `legacy`
    pub format: String,
}

/// Response from the verifier function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub result: String,
    #[serde(default)]
    pub reason: Option<String>,
    /// Display attributes, passed through untouched
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Response from a public key request
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    #[serde(default)]
    pub response_msg: Option<String>,
    pub public_key: String,
}

/// Base configuration for Ghost Pass clients
#[derive(Clone, Debug)]
pub struct BaseConfig {
    /// Host of the functions, with or without scheme. Defaults to https.
    pub base_url: String,
    pub port: Option<u16>,
    /// Bearer credential sent with issue and verify calls
    pub session_token: Option<String>,
    /// Extra root certificate in PEM format
    pub server_ca: Option<String>,
    /// Root public key of the issuer
    pub public_key: Option<String>,
    pub timeout: Duration,
}

impl BaseConfig {
    /// Get the formatted base URL, with scheme and port
    pub fn get_base_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{base}")
        };

        match self.port {
            Some(port) => format!("{base}:{port}"),
            None => base,
        }
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.get_base_url(), endpoint.trim_start_matches('/'))
    }
}

fn build_http_client(
    server_ca: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::ClientBuilder::new().timeout(timeout);

    if let Some(ca) = server_ca {
        let cert = reqwest::Certificate::from_pem(ca.as_bytes())
            .map_err(|e| ApiError::SslConfig(e.to_string()))?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|e| ApiError::SslConfig(e.to_string()))
}

async fn read_json<R>(response: reqwest::Response) -> Result<R, ApiError>
where
    R: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let error_text = response.text().await.unwrap_or_default();
        warn!(%status, "request was not authorized");
        return Err(ApiError::Unauthorized(format!("{status} - {error_text}")));
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!(%status, "request failed");
        return Err(ApiError::InvalidResponse(format!(
            "HTTP error: {status} - {error_text}"
        )));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {e}")))
}

/// HTTP/1.1 transport
#[derive(Debug)]
pub struct Http1Client {
    config: BaseConfig,
    client: reqwest::Client,
}

impl Http1Client {
    pub fn new(config: BaseConfig) -> Result<Self, ApiError> {
        let client = build_http_client(config.server_ca.as_deref(), config.timeout)?;
        Ok(Self { config, client })
    }

    /// POST a JSON body to an endpoint and decode the JSON answer
    pub async fn send_request<T, R>(&self, endpoint: &str, request_body: &T) -> Result<R, ApiError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.config.endpoint_url(endpoint);
        debug!(endpoint, "sending request");

        let mut request = self.client.post(&url).json(request_body);
        if let Some(session) = &self.config.session_token {
            request = request.bearer_auth(session);
        }

        let response = request.send().await.map_err(ApiError::HttpClient)?;
        read_json(response).await
    }

    /// GET an endpoint and decode the JSON answer
    pub async fn get<R>(&self, endpoint: &str) -> Result<R, ApiError>
    where
        R: for<'de> Deserialize<'de>,
    {
        let url = self.config.endpoint_url(endpoint);
        debug!(endpoint, "sending request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::HttpClient)?;
        read_json(response).await
    }
}

/// Client for the Ghost Pass issuer and verifier functions
#[derive(Debug)]
pub struct GhostPassClient {
    http: Http1Client,
}

/// Builder for creating Ghost Pass clients
pub struct GhostPassClientBuilder {
    config: BaseConfig,
}

impl GhostPassClientBuilder {
    pub fn new() -> Self {
        Self {
            config: BaseConfig {
                base_url: String::new(),
                port: None,
                session_token: None,
                server_ca: None,
                public_key: None,
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        }
    }

    /// Take connection settings from a GhostPassConfig
    pub fn from_config(mut self, config: &GhostPassConfig) -> Self {
        self.config.base_url = config.base_url.clone();
        self.config.port = config.port;
        self.config.session_token = config.session_token.clone();
        self.config.server_ca = config.server_ca.clone();
        self.config.public_key = config.public_key.clone();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn session_token(mut self, session_token: impl Into<String>) -> Self {
        self.config.session_token = Some(session_token.into());
        self
    }

    pub fn server_ca(mut self, server_ca: impl Into<String>) -> Self {
        self.config.server_ca = Some(server_ca.into());
        self
    }

    pub fn public_key(mut self, public_key: impl Into<String>) -> Self {
        self.config.public_key = Some(public_key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GhostPassClient, ApiError> {
        if self.config.base_url.trim().is_empty() {
            return Err(ApiError::Internal("base URL is required".to_string()));
        }
        Ok(GhostPassClient {
            http: Http1Client::new(self.config)?,
        })
    }
}

impl Default for GhostPassClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GhostPassClient {
    pub fn builder() -> GhostPassClientBuilder {
        GhostPassClientBuilder::new()
    }

    /// Fetch the issuer's public key without creating a client
    pub async fn fetch_public_key(
        base_url: impl Into<String>,
        port: Option<u16>,
        server_ca: Option<&str>,
    ) -> Result<String, ApiError> {
        let config = BaseConfig {
            base_url: base_url.into(),
            port,
            session_token: None,
            server_ca: server_ca.map(str::to_string),
            public_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        let response: PublicKeyResponse = Http1Client::new(config)?.get("public_key").await?;
        Ok(response.public_key)
    }

    pub fn config(&self) -> &BaseConfig {
        &self.http.config
    }

    pub fn has_session(&self) -> bool {
        self.http.config.session_token.is_some()
    }

    /// Ask the issuer for a fresh pass token
    pub async fn issue_token(
        &self,
        subject_id: &str,
        permissions: BTreeMap<String, bool>,
    ) -> Result<TokenGrant, ApiError> {
        if !self.has_session() {
            return Err(ApiError::Unauthorized("no session credential".to_string()));
        }

        let request = IssueTokenRequest {
            subject_id: subject_id.to_string(),
            permissions,
        };

        let response: IssueTokenResponse =
            self.http.send_request("issue_token", &request).await?;

        match (response.token, response.expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() => Ok(TokenGrant {
                token,
                expires_at,
                issued_at: response.issued_at,
            }),
            (Some(_), None) => Err(ApiError::InvalidResponse(
                "issuer response has no expires_at".to_string(),
            )),
            _ => Err(ApiError::TokenRequest(format!(
                "Failed to get token: {}",
                response.response_msg.unwrap_or_default()
            ))),
        }
    }

    /// Ask the verifier about a scanned token
    pub async fn verify_token(
        &self,
        token: &str,
        profile: Option<&str>,
        format: &str,
    ) -> Result<VerifyTokenResponse, ApiError> {
        let request = VerifyTokenRequest {
            token: token.to_string(),
            profile: profile.map(str::to_string),
            format: format.to_string(),
        };

        self.http.send_request("verify_token", &request).await
    }

    /// Get the public key from the server
    pub async fn get_public_key(&self) -> Result<String, ApiError> {
        let response: PublicKeyResponse = self.http.get("public_key").await?;
        Ok(response.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base_config(base_url: &str, port: Option<u16>) -> BaseConfig {
        BaseConfig {
            base_url: base_url.to_string(),
            port,
            session_token: None,
            server_ca: None,
            public_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn test_base_config_get_base_url_with_port() {
        let config = base_config("functions.ghostpass.app", Some(443));
        assert_eq!(config.get_base_url(), "https://functions.ghostpass.app:443");
    }

    #[test]
    fn test_base_config_get_base_url_without_port() {
        let config = base_config("http://127.0.0.1:8080/", None);
        assert_eq!(config.get_base_url(), "http://127.0.0.1:8080");
        assert_eq!(
            config.endpoint_url("/verify_token"),
            "http://127.0.0.1:8080/verify_token"
        );
    }

    #[test]
    fn test_client_builder_methods() {
        let builder = GhostPassClientBuilder::new()
            .base_url("functions.ghostpass.app")
            .port(443)
            .session_token("SESSION")
            .public_key("PUBKEY")
            .timeout(Duration::from_secs(2));

        assert_eq!(builder.config.base_url, "functions.ghostpass.app");
        assert_eq!(builder.config.port, Some(443));
        assert_eq!(builder.config.session_token.as_deref(), Some("SESSION"));
        assert_eq!(builder.config.public_key.as_deref(), Some("PUBKEY"));
        assert_eq!(builder.config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_requires_base_url() {
        assert!(matches!(
            GhostPassClient::builder().build(),
            Err(ApiError::Internal(_))
        ));
    }

    #[test]
    fn test_transport_classification() {
        assert!(ApiError::InvalidResponse("bad".into()).is_transport());
        assert!(!ApiError::Unauthorized("401".into()).is_transport());
        assert!(!ApiError::TokenRequest("no".into()).is_transport());
    }

    #[tokio::test]
    async fn test_issue_token_sends_bearer_and_permissions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/issue_token"))
            .and(bearer_token("session-1"))
            .and(body_json(json!({
                "subject_id": "wallet-1",
                "permissions": {"health": false, "identity": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "opaque",
                "expires_at": 1_030,
                "issued_at": 1_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GhostPassClient::builder()
            .base_url(server.uri())
            .session_token("session-1")
            .build()
            .unwrap();

        let permissions = BTreeMap::from([
            ("identity".to_string(), true),
            ("health".to_string(), false),
        ]);
        let grant = client.issue_token("wallet-1", permissions).await.unwrap();
        assert_eq!(
            grant,
            TokenGrant {
                token: "opaque".to_string(),
                expires_at: 1_030,
                issued_at: Some(1_000),
            }
        );
    }

    #[tokio::test]
    async fn test_issue_token_without_session_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GhostPassClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let err = client
            .issue_token("wallet-1", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/issue_token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("session expired"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/verify_token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = GhostPassClient::builder()
            .base_url(server.uri())
            .session_token("stale")
            .build()
            .unwrap();

        let err = client
            .issue_token("wallet-1", BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = client
            .verify_token("opaque", None, "structured")
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_verify_token_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify_token"))
            .and(body_json(json!({
                "token": "CC-12345678",
                "format": "legacy"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "ALLOW",
                "attributes": {"name": "Ada", "badges": ["vip"]}
            })))
            .mount(&server)
            .await;

        let client = GhostPassClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap();
        let response = client
            .verify_token("CC-12345678", None, "legacy")
            .await
            .unwrap();

        assert_eq!(response.result, "ALLOW");
        assert_eq!(response.reason, None);
        assert_eq!(response.attributes.unwrap()["name"], "Ada");
    }

    #[tokio::test]
    async fn test_public_key_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public_key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"public_key": "ed25519/00"})),
            )
            .mount(&server)
            .await;

        let key = GhostPassClient::fetch_public_key(server.uri(), None, None)
            .await
            .unwrap();
        assert_eq!(key, "ed25519/00");
    }
}
