//! Tool-call dispatcher.
//!
//! The [`Dispatcher`] turns a tool call (`operation_name` plus an argument
//! map) into at most one backend request:
//!
//! 1. Look the operation up in the static [catalog](crate::catalog)
//! 2. Validate every argument, collecting all violations
//! 3. Render the request with the credential scope injected
//! 4. Send it through the [`Transport`]
//! 5. Check the response shape and normalize payment objects
//!
//! Steps 1 and 2 never touch the network. Nothing is retried or
//! deduplicated: two identical calls to a mutating operation produce two
//! backend requests.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use voltage_mcp_bridge::{
//!     CredentialContext, Dispatcher, ToolCall, ToolResponse,
//!     transport::{HttpConfig, HttpTransport},
//! };
//!
//! # async fn example() -> voltage_mcp_bridge::Result<()> {
//! let context = Arc::new(CredentialContext::load()?);
//! let transport = HttpTransport::new(Arc::clone(&context), &HttpConfig::default())?;
//! let dispatcher = Dispatcher::new(context, transport);
//!
//! let arguments = json!({ "payment_id": "p1" }).as_object().cloned().unwrap_or_default();
//! let call = ToolCall::new("check_payment_status", arguments);
//!
//! match dispatcher.handle(call).await {
//!     ToolResponse::Result { result } => println!("{}", result["status"]),
//!     ToolResponse::Error { error } => eprintln!("{}: {}", error.kind, error.message),
//! }
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, AuditEventType, audit_log, redact_sensitive},
    catalog::{self, OperationDescriptor, ResponseShape, ValidatedArgs, validate_arguments},
    config::CredentialContext,
    error::{BridgeError, Result, ToolError},
    lifecycle::{PaymentState, normalize_payment, type_name},
    transport::Transport,
};

/// An inbound tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Catalog operation name.
    pub operation_name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for constructors"
    )]
    pub fn new(operation_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self { operation_name: operation_name.into(), arguments }
    }
}

/// The outcome of a tool call: `{"result": ...}` or `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResponse {
    /// Successful call.
    Result {
        /// Backend result, normalized where applicable.
        result: Value,
    },
    /// Failed call.
    Error {
        /// Error kind, message and details.
        error: ToolError,
    },
}

impl ToolResponse {
    /// Returns `true` for the error branch.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<Result<Value>> for ToolResponse {
    fn from(outcome: Result<Value>) -> Self {
        match outcome {
            Ok(result) => Self::Result { result },
            Err(err) => Self::Error { error: err.to_tool_error() },
        }
    }
}

/// Routes tool calls to the payment backend.
///
/// Cheap to share: wrap it in an [`Arc`] and call it from any task.
#[derive(Debug)]
pub struct Dispatcher<T> {
    context: Arc<CredentialContext>,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher over `transport`, scoped by `context`.
    #[must_use]
    pub const fn new(context: Arc<CredentialContext>, transport: T) -> Self {
        Self { context, transport }
    }

    /// Returns the credential context.
    #[must_use]
    pub fn context(&self) -> &CredentialContext {
        &self.context
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Handles a tool call and wraps the outcome in the response envelope.
    pub async fn handle(&self, call: ToolCall) -> ToolResponse {
        self.dispatch(&call.operation_name, &call.arguments).await.into()
    }

    /// Dispatches one operation.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`BridgeError::UnknownOperation`] if `operation_name` is not in the
    ///   catalog
    /// - [`BridgeError::Validation`] listing every invalid argument
    /// - [`BridgeError::Network`], [`BridgeError::Http`] or
    ///   [`BridgeError::Decode`] from the backend call
    #[instrument(skip_all, fields(operation = %operation_name, transport = self.transport.name()))]
    pub async fn dispatch(&self, operation_name: &str, arguments: &Map<String, Value>) -> Result<Value> {
        let descriptor = catalog::lookup(operation_name).ok_or_else(|| {
            warn!("unknown operation");
            BridgeError::UnknownOperation(operation_name.to_owned())
        })?;

        let args = validate_arguments(descriptor.params, arguments).inspect_err(|err| {
            debug!(error = %err, "arguments rejected");
        })?;

        let request = descriptor.render(&self.context, &args);
        let request_id = Uuid::new_v4();
        if descriptor.mutating {
            audit_log(&audit_event(AuditEventType::OperationAttempted, descriptor, request_id, &args));
        }

        let started = Instant::now();
        let outcome = self
            .transport
            .send(request)
            .await
            .and_then(|body| shape_response(descriptor.response, body, Utc::now()));
        let elapsed = started.elapsed();

        match &outcome {
            Ok(result) => {
                info!(elapsed = ?elapsed, "operation succeeded");
                if descriptor.mutating {
                    let mut event =
                        audit_event(AuditEventType::OperationSucceeded, descriptor, request_id, &args)
                            .with_duration(elapsed);
                    if let Some(state) = payment_state(result) {
                        event = event.with_payment_state(state);
                    }
                    audit_log(&event);
                }
            }
            Err(err) => {
                warn!(
                    error = %redact_sensitive(&err.to_string()),
                    kind = %err.kind(),
                    elapsed = ?elapsed,
                    "operation failed"
                );
                if descriptor.mutating {
                    audit_log(
                        &audit_event(AuditEventType::OperationFailed, descriptor, request_id, &args)
                            .with_duration(elapsed)
                            .with_error(&err.to_tool_error()),
                    );
                }
            }
        }

        outcome
    }
}

fn audit_event(
    event_type: AuditEventType,
    descriptor: &OperationDescriptor,
    request_id: Uuid,
    args: &ValidatedArgs,
) -> AuditEvent {
    let mut event = AuditEvent::new(event_type, descriptor.id, request_id);
    if let Some(wallet_id) = args.get("wallet_id").and_then(Value::as_str) {
        event = event.with_wallet_id(wallet_id);
    }
    if let Some(amount) = args.get("amount").and_then(Value::as_i64) {
        event = event.with_amount(amount);
    }
    if let Some(bolt11) = args.get("bolt11").and_then(Value::as_str) {
        event = event.with_bolt11(bolt11);
    }
    event
}

fn payment_state(result: &Value) -> Option<PaymentState> {
    result.get("status").cloned().and_then(|status| serde_json::from_value(status).ok())
}

/// Checks a success body against the expected shape and normalizes
/// payments.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] if the body has the wrong shape or a
/// payment cannot be normalized.
pub fn shape_response(shape: ResponseShape, body: Value, now: DateTime<Utc>) -> Result<Value> {
    match shape {
        ResponseShape::Deleted => Ok(body),
        ResponseShape::Wallet => match body {
            Value::Object(_) => Ok(body),
            other => Err(unexpected("a wallet object", &other)),
        },
        ResponseShape::Payment => normalize_payment(body, now),
        ResponseShape::WalletList | ResponseShape::Ledger | ResponseShape::PaymentList => {
            let normalize_items = |items: Vec<Value>| -> Result<Vec<Value>> {
                if shape.is_payment() {
                    items.into_iter().map(|item| normalize_payment(item, now)).collect()
                } else {
                    Ok(items)
                }
            };

            match body {
                Value::Array(items) => normalize_items(items).map(Value::Array),
                Value::Object(mut object) => match object.remove("items") {
                    Some(Value::Array(items)) => {
                        object.insert("items".to_owned(), Value::Array(normalize_items(items)?));
                        Ok(Value::Object(object))
                    }
                    _ => Err(BridgeError::Decode("expected a list or an object with an `items` array".to_owned())),
                },
                other => Err(unexpected("a list", &other)),
            }
        }
    }
}

fn unexpected(expected: &str, got: &Value) -> BridgeError {
    BridgeError::Decode(format!("expected {expected}, got {}", type_name(got)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::{
        config::ApiKey,
        error::ErrorKind,
        transport::{ApiRequest, HttpMethod},
    };

    const WALLET: &str = "0f1e2d3c-4b5a-4968-8776-a5b4c3d2e1f0";

    /// Transport that records requests and answers with a fixed body.
    struct RecordingTransport {
        reply: Result<Value>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl RecordingTransport {
        fn replying(reply: Result<Value>) -> Self {
            Self { reply, requests: Mutex::new(Vec::new()) }
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value> {
            self.requests.lock().unwrap().push(request);
            match &self.reply {
                Ok(value) => Ok(value.clone()),
                Err(BridgeError::Http { status, backend_message }) => {
                    Err(BridgeError::Http { status: *status, backend_message: backend_message.clone() })
                }
                Err(err) => Err(BridgeError::Network(err.to_string())),
            }
        }
    }

    fn dispatcher(reply: Result<Value>) -> Dispatcher<RecordingTransport> {
        let context = CredentialContext::new(
            ApiKey::new("vltg_test".to_owned()),
            Uuid::nil(),
            Uuid::nil(),
            "https://voltageapi.com",
        )
        .unwrap();
        Dispatcher::new(Arc::new(context), RecordingTransport::replying(reply))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_dispatch_unknown_operation() {
        let dispatcher = dispatcher(Ok(json!({})));
        let err = dispatcher.dispatch("add", &Map::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownOperation(ref name) if name == "add"));
        assert!(dispatcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_validation_error_skips_network() {
        let dispatcher = dispatcher(Ok(json!({})));
        let err = dispatcher
            .dispatch("generate_bolt11_invoice", &args(json!({ "wallet_id": "nope", "amount": 0 })))
            .await
            .unwrap_err();

        let BridgeError::Validation(violations) = err else {
            panic!("expected validation error");
        };
        assert_eq!(violations.len(), 2);
        assert!(dispatcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_sends_rendered_request() {
        let dispatcher = dispatcher(Ok(json!({ "id": WALLET, "name": "ops" })));
        let result = dispatcher.dispatch("get_wallet", &args(json!({ "wallet_id": WALLET }))).await.unwrap();

        assert_eq!(result["name"], "ops");
        let requests = dispatcher.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert!(requests[0].path.ends_with(&format!("/wallets/{WALLET}")));
    }

    #[tokio::test]
    async fn test_dispatch_normalizes_payment() {
        let dispatcher = dispatcher(Ok(json!({ "id": "p1", "status": "pending", "bolt11": "lnbc1..." })));
        let result = dispatcher
            .dispatch("generate_bolt11_invoice", &args(json!({ "wallet_id": WALLET, "amount": 1000 })))
            .await
            .unwrap();

        assert_eq!(result["status"], "PENDING");
        assert_eq!(result["bolt11"], "lnbc1...");
    }

    #[tokio::test]
    async fn test_dispatch_passes_backend_error_through() {
        let dispatcher = dispatcher(Err(BridgeError::Http { status: 404, backend_message: "not found".into() }));
        let err = dispatcher.dispatch("delete_wallet", &args(json!({ "wallet_id": WALLET }))).await.unwrap_err();
        assert!(matches!(err, BridgeError::Http { status: 404, ref backend_message } if backend_message == "not found"));
        assert_eq!(dispatcher.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_non_hyphenated_wallet_id() {
        let dispatcher = dispatcher(Ok(json!({})));
        for form in [
            format!("{{{WALLET}}}"),
            format!("urn:uuid:{WALLET}"),
            WALLET.replace('-', ""),
        ] {
            let err = dispatcher.dispatch("get_wallet", &args(json!({ "wallet_id": form }))).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{form}");
        }
        assert!(dispatcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn test_failure_log_redacts_invoice() {
        let invoice = "lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypq";
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dispatcher = dispatcher(Err(BridgeError::Http {
            status: 409,
            backend_message: format!("invoice {invoice} already paid"),
        }));
        let err = dispatcher
            .dispatch("pay_bolt11_invoice", &args(json!({ "wallet_id": WALLET, "bolt11": invoice })))
            .await
            .unwrap_err();

        // The returned error keeps the backend message; only logs are redacted.
        assert!(err.to_string().contains(invoice));

        let output = buffer.contents();
        assert!(output.contains("operation failed"));
        assert!(output.contains("lnbc2500u1...qypq"));
        assert!(!output.contains(invoice));
        assert!(output.contains("dispatch{operation=pay_bolt11_invoice"));
        assert!(!output.contains("operation_name="));
    }

    /// Shared in-memory sink for a test subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_handle_wraps_envelope() {
        let dispatcher = dispatcher(Ok(json!([])));
        let response = dispatcher.handle(ToolCall::new("get_all_wallets", Map::new())).await;
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "result": [] }));

        let response = dispatcher.handle(ToolCall::new("nope", Map::new())).await;
        assert!(response.is_error());
        let ToolResponse::Error { error } = response else {
            panic!("expected error");
        };
        assert_eq!(error.kind, ErrorKind::UnknownOperation);
    }

    #[test]
    fn test_tool_call_deserialize_defaults_arguments() {
        let call: ToolCall = serde_json::from_value(json!({ "operation_name": "get_all_wallets" })).unwrap();
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_tool_response_error_serialization() {
        let response = ToolResponse::from(Err(BridgeError::Decode("bad".into())));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["kind"], "DecodeError");
        assert!(json.get("result").is_none());

        let back: ToolResponse = serde_json::from_value(json).unwrap();
        assert!(back.is_error());
    }

    #[test]
    fn test_shape_list_accepts_array_and_items_object() {
        assert_eq!(shape_response(ResponseShape::WalletList, json!([]), now()).unwrap(), json!([]));

        let paged = json!({ "items": [{ "id": "e1" }], "total": 1 });
        assert_eq!(shape_response(ResponseShape::Ledger, paged.clone(), now()).unwrap(), paged);
    }

    #[test]
    fn test_shape_list_rejects_other_shapes() {
        assert!(matches!(shape_response(ResponseShape::WalletList, json!({}), now()), Err(BridgeError::Decode(_))));
        assert!(matches!(
            shape_response(ResponseShape::Ledger, json!({ "items": "x" }), now()),
            Err(BridgeError::Decode(_))
        ));
        assert!(matches!(shape_response(ResponseShape::PaymentList, json!(null), now()), Err(BridgeError::Decode(_))));
    }

    #[test]
    fn test_shape_payment_list_normalizes_each_item() {
        let body = json!({ "items": [
            { "id": "p1", "status": "settled" },
            { "id": "p2", "status": "receiving", "expires_at": "2024-01-01T00:00:00Z" }
        ] });
        let result = shape_response(ResponseShape::PaymentList, body, now()).unwrap();
        assert_eq!(result["items"][0]["status"], "SETTLED");
        assert_eq!(result["items"][1]["status"], "EXPIRED");
    }

    #[test]
    fn test_shape_wallet_requires_object() {
        assert!(shape_response(ResponseShape::Wallet, json!({ "id": WALLET }), now()).is_ok());
        let err = shape_response(ResponseShape::Wallet, json!("ok"), now()).unwrap_err();
        assert_eq!(err.to_string(), "failed to decode backend response: expected a wallet object, got string");
    }

    #[test]
    fn test_shape_deleted_accepts_anything() {
        assert_eq!(shape_response(ResponseShape::Deleted, Value::Null, now()).unwrap(), Value::Null);
        assert_eq!(shape_response(ResponseShape::Deleted, json!("ok"), now()).unwrap(), json!("ok"));
    }
}
