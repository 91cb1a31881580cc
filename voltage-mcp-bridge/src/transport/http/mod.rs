//! HTTP transport implementation.
//!
//! This module provides the production [`Transport`] backed by reqwest. Every
//! request carries the API key header and `Accept: application/json`; bodies
//! are serialized as JSON.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::{AuthScheme, HttpConfig};
use crate::{
    config::CredentialContext,
    error::{BridgeError, Result},
    transport::{ApiRequest, HttpMethod, Transport},
};

/// Sanitizes path to prevent path traversal.
///
/// Rendered operation paths always start with `/`; anything containing
/// traversal sequences is a caller bug or an injection attempt.
fn sanitize_path(path: &str) -> Result<&str> {
    if path.contains("..") || path.contains("//") {
        return Err(BridgeError::validation(vec![crate::error::FieldViolation::new(
            "path",
            "traversal sequences not allowed",
        )]));
    }
    if !path.starts_with('/') {
        return Err(BridgeError::validation(vec![crate::error::FieldViolation::new(
            "path",
            "must start with '/'",
        )]));
    }
    Ok(path)
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Holds the shared [`CredentialContext`] and a pooled [`Client`]. Cloning the
/// client is cheap, so one transport can serve every dispatcher in the process.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use voltage_mcp_bridge::{
///     config::CredentialContext,
///     transport::{HttpConfig, HttpTransport},
/// };
///
/// # fn example() -> voltage_mcp_bridge::Result<()> {
/// let ctx = Arc::new(CredentialContext::load()?);
/// let config = HttpConfig::from_toml("timeout_secs = 15")?;
/// let transport = HttpTransport::new(ctx, &config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    context: Arc<CredentialContext>,
    api_prefix: String,
    auth_scheme: AuthScheme,
}

impl HttpTransport {
    /// Creates an HTTP transport bound to `context`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if `config` is out of range or
    /// the HTTP client cannot be built.
    pub fn new(context: Arc<CredentialContext>, config: &HttpConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("voltage-mcp-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            context,
            api_prefix: config.api_prefix.clone(),
            auth_scheme: config.auth_scheme,
        })
    }

    /// Returns the credential context this transport authenticates with.
    #[must_use]
    pub fn context(&self) -> &CredentialContext {
        &self.context
    }

    /// Builds the absolute URL for a rendered request.
    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let path = sanitize_path(&request.path)?;
        let raw = format!("{}{}{path}", self.context.base_url(), self.api_prefix);

        let mut url = Url::parse(&raw)
            .map_err(|e| BridgeError::Configuration(format!("invalid request URL {raw}: {e}")))?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.context.api_key().expose();
        match self.auth_scheme {
            AuthScheme::ApiKey => builder.header("X-API-Key", key),
            AuthScheme::Bearer => builder.bearer_auth(key),
        }
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method, path = %request.path)
    )]
    async fn execute_request(&self, request: ApiRequest) -> Result<Value> {
        let url = self.url_for(&request)?;

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        };

        let mut builder = self.authorize(builder).header("Accept", "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), "backend unreachable");
            BridgeError::from(e)
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Network(format!("failed to read response body: {e}")))?;

        debug!(status = status.as_u16(), bytes = bytes.len(), "backend responded");

        if !status.is_success() {
            return Err(BridgeError::Http {
                status: status.as_u16(),
                backend_message: backend_message(status, &bytes),
            });
        }

        decode_success_body(&bytes)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        self.execute_request(request).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Decodes a 2xx body; empty bodies are `null`.
fn decode_success_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| BridgeError::Decode(format!("response body is not valid JSON: {e}")))
}

/// Extracts the most useful error message from a non-success body.
///
/// Prefers the JSON `message`, `error` or `detail` field, then the raw body
/// text, then the canonical reason phrase.
fn backend_message(status: StatusCode, bytes: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
        for key in ["message", "error", "detail"] {
            match json.get(key) {
                Some(Value::String(text)) if !text.is_empty() => return text.clone(),
                Some(other @ (Value::Object(_) | Value::Array(_))) => return other.to_string(),
                _ => {}
            }
        }
    }

    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_owned()
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::config::ApiKey;

    fn context(base_url: &str) -> Arc<CredentialContext> {
        Arc::new(
            CredentialContext::new(
                ApiKey::new("vltg_test".to_owned()),
                Uuid::nil(),
                Uuid::nil(),
                base_url,
            )
            .unwrap(),
        )
    }

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(context(base_url), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_http_transport_new() {
        let transport = transport("https://voltageapi.com");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.context().base_url(), "https://voltageapi.com");
    }

    #[test]
    fn test_http_transport_rejects_invalid_config() {
        let config = HttpConfig { timeout_secs: 0, ..HttpConfig::default() };
        let result = HttpTransport::new(context("https://voltageapi.com"), &config);
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_url_for_joins_prefix_and_query() {
        let transport = transport("https://voltageapi.com");
        let request = ApiRequest::new(HttpMethod::Get, "/organizations/o/wallets".to_owned())
            .with_query(vec![("environment_id".to_owned(), "e 1".to_owned())]);

        let url = transport.url_for(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://voltageapi.com/api/v1/organizations/o/wallets?environment_id=e+1"
        );
    }

    #[test]
    fn test_url_for_without_prefix() {
        let config = HttpConfig { api_prefix: String::new(), ..HttpConfig::default() };
        let transport = HttpTransport::new(context("https://voltageapi.com"), &config).unwrap();
        let request = ApiRequest::new(HttpMethod::Get, "/wallets".to_owned());
        assert_eq!(transport.url_for(&request).unwrap().as_str(), "https://voltageapi.com/wallets");
    }

    #[test]
    fn test_sanitize_path_valid() {
        assert!(sanitize_path("/organizations/o/wallets").is_ok());
        assert!(sanitize_path("/").is_ok());
    }

    #[test]
    fn test_sanitize_path_traversal_blocked() {
        assert!(sanitize_path("/wallets/../secrets").is_err());
        assert!(sanitize_path("/wallets//ledger").is_err());
        assert!(sanitize_path("wallets").is_err());
    }

    #[test]
    fn test_decode_success_body_empty_is_null() {
        assert_eq!(decode_success_body(b"").unwrap(), Value::Null);
        assert_eq!(decode_success_body(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_success_body_invalid_json() {
        let result = decode_success_body(b"<html>oops</html>");
        assert!(matches!(result, Err(BridgeError::Decode(_))));
    }

    #[test]
    fn test_backend_message_prefers_json_fields() {
        let body = br#"{"message":"wallet not found","code":404}"#;
        assert_eq!(backend_message(StatusCode::NOT_FOUND, body), "wallet not found");

        let body = br#"{"error":"invalid api key"}"#;
        assert_eq!(backend_message(StatusCode::UNAUTHORIZED, body), "invalid api key");

        let body = br#"{"detail":{"field":"amount"}}"#;
        assert_eq!(backend_message(StatusCode::BAD_REQUEST, body), r#"{"field":"amount"}"#);
    }

    #[test]
    fn test_backend_message_falls_back_to_text() {
        assert_eq!(backend_message(StatusCode::BAD_GATEWAY, b"upstream down"), "upstream down");
        assert_eq!(backend_message(StatusCode::CONFLICT, b""), "Conflict");
    }

    #[test]
    fn test_backend_message_long_body_verbatim() {
        let long = "x".repeat(10_000);
        let message = backend_message(StatusCode::INTERNAL_SERVER_ERROR, long.as_bytes());
        assert_eq!(message, long);

        let body = serde_json::to_vec(&serde_json::json!({ "message": long })).unwrap();
        assert_eq!(backend_message(StatusCode::BAD_REQUEST, &body), long);
    }
}
