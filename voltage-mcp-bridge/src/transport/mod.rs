//! Transport abstraction for the payment backend.
//!
//! The [`Transport`] trait is the single seam between the dispatcher and the
//! network. [`HttpTransport`] is the production implementation; tests
//! substitute in-memory stubs that record calls.
//!
//! # Contract
//!
//! - One call to [`Transport::send`] is exactly one backend round trip
//! - No retries at this layer
//! - Failures are classified as [`BridgeError::Network`](crate::BridgeError::Network),
//!   [`BridgeError::Http`](crate::BridgeError::Http) or
//!   [`BridgeError::Decode`](crate::BridgeError::Decode)
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use voltage_mcp_bridge::{
//!     config::CredentialContext,
//!     transport::{ApiRequest, HttpConfig, HttpMethod, HttpTransport, Transport},
//! };
//!
//! # async fn example() -> voltage_mcp_bridge::Result<()> {
//! let ctx = Arc::new(CredentialContext::load()?);
//! let transport = HttpTransport::new(ctx, &HttpConfig::default())?;
//!
//! let request = ApiRequest::new(HttpMethod::Get, "/organizations/org/wallets".to_owned());
//! let wallets = transport.send(request).await?;
//! println!("{wallets}");
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::error::Result;

pub mod config;
pub mod http;

pub use config::{AuthScheme, HttpConfig};
pub use http::HttpTransport;

/// HTTP methods used by the operation catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Remove.
    Delete,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered backend request.
///
/// `path` is relative to the configured base URL and API prefix and already
/// has every template parameter substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Rendered path, starting with `/`.
    pub path: String,
    /// Query string pairs, in order.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request with no query string and no body.
    #[must_use]
    pub const fn new(method: HttpMethod, path: String) -> Self {
        Self { method, path, query: Vec::new(), body: None }
    }

    /// Replaces the query string pairs.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Backend transport.
///
/// Implementations must be shareable across tasks; the dispatcher may be
/// invoked concurrently by the hosting runtime.
pub trait Transport: Send + Sync {
    /// Executes one request and returns the decoded JSON body.
    ///
    /// A successful response with an empty body yields [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Network`](crate::BridgeError::Network) when the
    /// backend is unreachable, [`BridgeError::Http`](crate::BridgeError::Http)
    /// for non-success statuses, and
    /// [`BridgeError::Decode`](crate::BridgeError::Decode) for non-JSON
    /// success bodies.
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value>> + Send + '_;

    /// Returns a short name for logging.
    fn name(&self) -> &'static str {
        "transport"
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value>> + Send + '_ {
        (**self).send(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
