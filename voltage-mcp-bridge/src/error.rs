//! Error types for the Voltage MCP bridge.
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! type [`BridgeError`] is the small, stable taxonomy a calling agent branches
//! on. All errors implement [`std::error::Error`] via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Startup** ([`BridgeError::Configuration`]): credential or transport
//!   settings are missing or malformed
//! - **Local** ([`BridgeError::UnknownOperation`], [`BridgeError::Validation`]):
//!   resolved before any network call
//! - **Remote** ([`BridgeError::Network`], [`BridgeError::Http`],
//!   [`BridgeError::Decode`]): failures talking to the payment backend
//!
//! # Examples
//!
//! ```
//! use voltage_mcp_bridge::error::{BridgeError, FieldViolation, Result};
//!
//! fn require_name(name: Option<&str>) -> Result<&str> {
//!     name.ok_or_else(|| BridgeError::validation(vec![FieldViolation::missing("name")]))
//! }
//!
//! let err = require_name(None).unwrap_err();
//! assert_eq!(err.kind().as_str(), "ValidationError");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Result type alias for bridge operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// A single argument that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Argument name as declared in the operation schema.
    pub field: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl FieldViolation {
    /// Creates a violation with an explicit reason.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }

    /// Creates a "required argument is missing" violation.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required argument is missing")
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Errors that can occur in the Voltage MCP bridge.
///
/// The variant set is closed. Calling agents see it through
/// [`ErrorKind`] and decide for themselves whether to retry.
///
/// # Error Recovery
///
/// - [`Configuration`](Self::Configuration): fix the environment and restart
/// - [`UnknownOperation`](Self::UnknownOperation),
///   [`Validation`](Self::Validation): fix the tool call; nothing reached the
///   backend
/// - [`Network`](Self::Network): safe to retry reads; for payment-affecting
///   operations check state with `check_payment_status` first
/// - [`Http`](Self::Http): inspect `status` and `backend_message`
/// - [`Decode`](Self::Decode): backend contract changed; report it
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Startup configuration is missing or malformed.
    ///
    /// Raised while loading the credential context or the HTTP transport
    /// settings. The process must not enter a ready state after this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use voltage_mcp_bridge::error::BridgeError;
    ///
    /// let err = BridgeError::Configuration("ORGANIZATION_ID is not set".to_owned());
    /// assert!(err.to_string().contains("ORGANIZATION_ID"));
    /// ```
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested operation is not in the static catalog.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// One or more arguments failed schema or constraint checks.
    ///
    /// Validation is exhaustive, so this carries every violation found in the
    /// call, not only the first. It is never produced after a network call.
    #[error("invalid arguments: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    /// The backend could not be reached (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success HTTP status.
    ///
    /// `backend_message` is passed through verbatim for the caller to
    /// interpret (auth failure, not found, conflict, rate limit, ...).
    #[error("backend returned HTTP {status}: {backend_message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the backend response body.
        backend_message: String,
    },

    /// The backend response did not match the expected shape.
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl BridgeError {
    /// Builds a [`Validation`](Self::Validation) error.
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::Validation(violations)
    }

    /// Returns the stable taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnknownOperation(_) => ErrorKind::UnknownOperation,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::Http,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Returns `true` if the failure is plausibly transient.
    ///
    /// Advisory only: nothing in this crate retries. Network failures and
    /// HTTP 408, 429 and 5xx responses are considered transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Converts the error into the wire-level error body returned to agents.
    #[must_use]
    pub fn to_tool_error(&self) -> ToolError {
        let details = match self {
            Self::Validation(violations) => Some(json!({ "violations": violations })),
            Self::Http { status, backend_message } => {
                Some(json!({ "status": status, "backend_message": backend_message }))
            }
            Self::UnknownOperation(_) => {
                Some(json!({ "available_operations": crate::catalog::operation_names() }))
            }
            Self::Configuration(_) | Self::Network(_) | Self::Decode(_) => None,
        };

        ToolError { kind: self.kind(), message: self.to_string(), details }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Stable error kind names exposed to calling agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or malformed startup configuration.
    #[serde(rename = "ConfigurationError")]
    Configuration,
    /// Operation name outside the catalog.
    #[serde(rename = "UnknownOperationError")]
    UnknownOperation,
    /// Argument failed local validation.
    #[serde(rename = "ValidationError")]
    Validation,
    /// Backend unreachable.
    #[serde(rename = "NetworkError")]
    Network,
    /// Backend rejected the request.
    #[serde(rename = "HTTPError")]
    Http,
    /// Backend response had an unexpected shape.
    #[serde(rename = "DecodeError")]
    Decode,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::UnknownOperation => "UnknownOperationError",
            Self::Validation => "ValidationError",
            Self::Network => "NetworkError",
            Self::Http => "HTTPError",
            Self::Decode => "DecodeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body of a tool response: `{kind, message, details?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Structured details (violations, HTTP status, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let error = BridgeError::Configuration("API_KEY is not set".into());
        assert_eq!(error.to_string(), "configuration error: API_KEY is not set");
    }

    #[test]
    fn test_validation_error_lists_every_violation() {
        let error = BridgeError::validation(vec![
            FieldViolation::missing("wallet_id"),
            FieldViolation::new("amount", "must be an integer >= 1"),
        ]);
        let message = error.to_string();
        assert!(message.contains("wallet_id: required argument is missing"));
        assert!(message.contains("amount: must be an integer >= 1"));
    }

    #[test]
    fn test_http_error_display() {
        let error = BridgeError::Http { status: 404, backend_message: "wallet not found".into() };
        assert_eq!(error.to_string(), "backend returned HTTP 404: wallet not found");
    }

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(ErrorKind::Configuration.as_str(), "ConfigurationError");
        assert_eq!(ErrorKind::UnknownOperation.as_str(), "UnknownOperationError");
        assert_eq!(ErrorKind::Validation.as_str(), "ValidationError");
        assert_eq!(ErrorKind::Network.as_str(), "NetworkError");
        assert_eq!(ErrorKind::Http.as_str(), "HTTPError");
        assert_eq!(ErrorKind::Decode.as_str(), "DecodeError");
    }

    #[test]
    fn test_kind_serializes_as_wire_name() {
        let json = serde_json::to_value(ErrorKind::Http).unwrap();
        assert_eq!(json, json!("HTTPError"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::Network("timeout".into()).is_retryable());
        assert!(BridgeError::Http { status: 503, backend_message: String::new() }.is_retryable());
        assert!(BridgeError::Http { status: 429, backend_message: String::new() }.is_retryable());
        assert!(!BridgeError::Http { status: 404, backend_message: String::new() }.is_retryable());
        assert!(!BridgeError::Decode("bad".into()).is_retryable());
        assert!(!BridgeError::validation(vec![]).is_retryable());
    }

    #[test]
    fn test_tool_error_validation_details() {
        let error = BridgeError::validation(vec![FieldViolation::missing("bolt11")]);
        let body = error.to_tool_error();
        assert_eq!(body.kind, ErrorKind::Validation);
        assert_eq!(
            body.details,
            Some(json!({ "violations": [{ "field": "bolt11", "reason": "required argument is missing" }] }))
        );
    }

    #[test]
    fn test_tool_error_http_details() {
        let error = BridgeError::Http { status: 401, backend_message: "bad key".into() };
        let body = error.to_tool_error();
        assert_eq!(body.kind, ErrorKind::Http);
        assert_eq!(body.details, Some(json!({ "status": 401, "backend_message": "bad key" })));
    }

    #[test]
    fn test_tool_error_unknown_operation_lists_catalog() {
        let body = BridgeError::UnknownOperation("add".into()).to_tool_error();
        let available = body.details.unwrap()["available_operations"].clone();
        assert!(available.as_array().unwrap().iter().any(|name| name == "get_wallet"));
    }

    #[test]
    fn test_tool_error_omits_empty_details() {
        let body = BridgeError::Network("connection refused".into()).to_tool_error();
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("details").is_none());
        assert_eq!(json["kind"], "NetworkError");
    }
}
