//! Payment lifecycle normalization.
//!
//! The backend reports payment status in its own vocabulary. This module
//! maps it onto a small fixed state machine so agents can branch on one set
//! of names:
//!
//! ```text
//! CREATED ──► PENDING ──┬─► SETTLED
//!                       ├─► EXPIRED
//!                       └─► FAILED
//! ```
//!
//! The tracker is stateless. Every read recomputes the state from the
//! backend's current fields, evaluated in priority order (first match wins):
//!
//! 1. `settled_at` present: `SETTLED`
//! 2. settled-family status (`settled`, `completed`, `paid`, ...): `SETTLED`
//! 3. failed-family status or an `error` field: `FAILED`
//! 4. status `expired`: `EXPIRED`
//! 5. `expires_at` in the past: `EXPIRED`
//! 6. created-family status (`created`, `generating`, ...): `CREATED`
//! 7. anything else: `PENDING`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BridgeError, Result};

const SETTLED_STATUSES: &[&str] = &["settled", "completed", "complete", "succeeded", "success", "paid"];
const FAILED_STATUSES: &[&str] = &["failed", "failure", "error", "rejected", "cancelled", "canceled"];
const EXPIRED_STATUSES: &[&str] = &["expired"];
const CREATED_STATUSES: &[&str] = &["created", "generating", "generated", "initialized", "new"];

/// Normalized payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Invoice generated, not yet observed as pending.
    Created,
    /// Outstanding.
    Pending,
    /// Settled.
    Settled,
    /// Expired without settlement.
    Expired,
    /// Failed or could not route.
    Failed,
}

impl PaymentState {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Settled => "SETTLED",
            Self::Expired => "EXPIRED",
            Self::Failed => "FAILED",
        }
    }

    /// Returns `true` if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Expired | Self::Failed)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend fields that drive normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentObservation {
    /// Raw backend status.
    pub status: Option<String>,
    /// Settlement time.
    pub settled_at: Option<DateTime<Utc>>,
    /// Expiry time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the backend attached an error.
    pub has_error: bool,
    /// BOLT11 payment request, wherever the backend put it.
    pub bolt11: Option<String>,
}

impl PaymentObservation {
    /// Extracts the observation from a backend payment object.
    ///
    /// Fields are read at top level first, then from a nested `data` object.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Decode`] if `status` is not a string or a
    /// timestamp is not RFC 3339.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let status = match field(object, "status") {
            None => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => {
                return Err(BridgeError::Decode(format!("payment status must be a string, got {other}")));
            }
        };

        let has_error = field(object, "error").is_some_and(|error| match error {
            Value::String(text) => !text.trim().is_empty(),
            Value::Bool(flag) => *flag,
            _ => true,
        });

        let bolt11 = field(object, "bolt11")
            .or_else(|| field(object, "payment_request"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Self {
            status,
            settled_at: timestamp(object, "settled_at")?,
            expires_at: timestamp(object, "expires_at")?,
            created_at: timestamp(object, "created_at")?,
            has_error,
            bolt11,
        })
    }

    /// Computes the normalized state as of `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> PaymentState {
        let status = self.status.as_deref().map(canonical_status);
        let status_in = |set: &[&str]| status.as_deref().is_some_and(|s| set.contains(&s));

        if self.settled_at.is_some() || status_in(SETTLED_STATUSES) {
            PaymentState::Settled
        } else if self.has_error || status_in(FAILED_STATUSES) {
            PaymentState::Failed
        } else if status_in(EXPIRED_STATUSES) || self.expires_at.is_some_and(|at| at <= now) {
            PaymentState::Expired
        } else if status_in(CREATED_STATUSES) {
            PaymentState::Created
        } else {
            PaymentState::Pending
        }
    }
}

/// Normalizes one backend payment object.
///
/// The result is the backend object with `status` replaced by the normalized
/// state, the raw status kept as `backend_status`, a `terminal` flag, and
/// `bolt11` lifted to top level. Every other field passes through.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] if `value` is not an object or its fields
/// cannot be read.
pub fn normalize_payment(value: Value, now: DateTime<Utc>) -> Result<Value> {
    let Value::Object(mut object) = value else {
        return Err(BridgeError::Decode(format!("expected a payment object, got {}", type_name(&value))));
    };

    let observation = PaymentObservation::from_object(&object)?;
    let state = observation.state_at(now);

    debug!(
        backend_status = observation.status.as_deref().unwrap_or("<none>"),
        state = %state,
        "normalized payment"
    );

    if let Some(raw) = observation.status {
        object.insert("backend_status".to_owned(), Value::String(raw));
    }
    object.insert("status".to_owned(), Value::String(state.as_str().to_owned()));
    object.insert("terminal".to_owned(), Value::Bool(state.is_terminal()));
    if let Some(bolt11) = observation.bolt11 {
        object.entry("bolt11").or_insert(Value::String(bolt11));
    }

    Ok(Value::Object(object))
}

/// Lowercases and folds `-` and spaces into `_`.
fn canonical_status(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Reads a non-null field at top level or under `data`.
fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let present = |value: &&Value| !value.is_null();
    object.get(key).filter(present).or_else(|| {
        object.get("data").and_then(Value::as_object).and_then(|data| data.get(key)).filter(present)
    })
}

fn timestamp(object: &Map<String, Value>, key: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = field(object, key) else {
        return Ok(None);
    };
    let text = value
        .as_str()
        .ok_or_else(|| BridgeError::Decode(format!("{key} must be an RFC 3339 string, got {value}")))?;
    DateTime::parse_from_rfc3339(text)
        .map(|at| Some(at.with_timezone(&Utc)))
        .map_err(|e| BridgeError::Decode(format!("{key} is not a valid RFC 3339 timestamp: {e}")))
}

pub(crate) const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn state(value: Value) -> PaymentState {
        PaymentObservation::from_object(value.as_object().unwrap()).unwrap().state_at(now())
    }

    #[test]
    fn test_settlement_timestamp_wins() {
        assert_eq!(state(json!({ "status": "pending", "settled_at": "2024-01-01T00:00:00Z" })), PaymentState::Settled);
        assert_eq!(
            state(json!({ "status": "failed", "settled_at": "2024-01-01T00:00:00Z", "expires_at": "2020-01-01T00:00:00Z" })),
            PaymentState::Settled
        );
    }

    #[test]
    fn test_settled_family_statuses() {
        for status in ["settled", "Completed", "SUCCEEDED", "paid"] {
            assert_eq!(state(json!({ "status": status })), PaymentState::Settled, "{status}");
        }
    }

    #[test]
    fn test_failed_statuses_and_error_field() {
        assert_eq!(state(json!({ "status": "failed" })), PaymentState::Failed);
        assert_eq!(state(json!({ "status": "Cancelled" })), PaymentState::Failed);
        assert_eq!(state(json!({ "status": "sending", "error": "no route" })), PaymentState::Failed);
        assert_eq!(state(json!({ "status": "sending", "error": "" })), PaymentState::Pending);
    }

    #[test]
    fn test_failure_outranks_expiry() {
        assert_eq!(
            state(json!({ "status": "failed", "expires_at": "2020-01-01T00:00:00Z" })),
            PaymentState::Failed
        );
    }

    #[test]
    fn test_expiry() {
        assert_eq!(state(json!({ "status": "expired" })), PaymentState::Expired);
        assert_eq!(
            state(json!({ "status": "receiving", "expires_at": "2024-06-01T11:59:59Z" })),
            PaymentState::Expired
        );
        assert_eq!(
            state(json!({ "status": "receiving", "expires_at": "2024-06-01T12:00:01Z" })),
            PaymentState::Pending
        );
    }

    #[test]
    fn test_expired_invoice_never_created() {
        assert_eq!(
            state(json!({ "status": "generated", "expires_at": "2020-01-01T00:00:00Z" })),
            PaymentState::Expired
        );
    }

    #[test]
    fn test_created_statuses() {
        assert_eq!(state(json!({ "status": "generating" })), PaymentState::Created);
        assert_eq!(state(json!({ "status": "new" })), PaymentState::Created);
    }

    #[test]
    fn test_everything_else_is_pending() {
        assert_eq!(state(json!({})), PaymentState::Pending);
        assert_eq!(state(json!({ "status": "in-flight" })), PaymentState::Pending);
        assert_eq!(state(json!({ "status": "something_new" })), PaymentState::Pending);
    }

    #[test]
    fn test_canonical_status() {
        assert_eq!(canonical_status(" In-Flight "), "in_flight");
        assert_eq!(canonical_status("in flight"), "in_flight");
    }

    #[test]
    fn test_nested_data_fallback() {
        let observation = PaymentObservation::from_object(
            json!({
                "id": "p1",
                "data": { "status": "completed", "payment_request": "lnbc1xyz" }
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(observation.status.as_deref(), Some("completed"));
        assert_eq!(observation.bolt11.as_deref(), Some("lnbc1xyz"));
        assert_eq!(observation.state_at(now()), PaymentState::Settled);
    }

    #[test]
    fn test_invalid_timestamp_is_decode_error() {
        let result = PaymentObservation::from_object(json!({ "settled_at": "yesterday" }).as_object().unwrap());
        assert!(matches!(result, Err(BridgeError::Decode(ref msg)) if msg.contains("settled_at")));

        let result = PaymentObservation::from_object(json!({ "expires_at": 1_700_000_000 }).as_object().unwrap());
        assert!(matches!(result, Err(BridgeError::Decode(_))));
    }

    #[test]
    fn test_non_string_status_is_decode_error() {
        let result = PaymentObservation::from_object(json!({ "status": 3 }).as_object().unwrap());
        assert!(matches!(result, Err(BridgeError::Decode(_))));
    }

    #[test]
    fn test_normalize_payment_output_shape() {
        let output = normalize_payment(
            json!({ "id": "p1", "status": "pending", "bolt11": "lnbc1...", "amount": 1000 }),
            now(),
        )
        .unwrap();

        assert_eq!(output["status"], "PENDING");
        assert_eq!(output["backend_status"], "pending");
        assert_eq!(output["terminal"], false);
        assert_eq!(output["bolt11"], "lnbc1...");
        assert_eq!(output["amount"], 1000);
        assert_eq!(output["id"], "p1");
    }

    #[test]
    fn test_normalize_payment_lifts_nested_bolt11() {
        let output =
            normalize_payment(json!({ "id": "p2", "data": { "payment_request": "lntb5u1abc" } }), now()).unwrap();
        assert_eq!(output["bolt11"], "lntb5u1abc");
        assert!(output.get("backend_status").is_none());
        assert_eq!(output["terminal"], false);
    }

    #[test]
    fn test_normalize_payment_terminal_flag() {
        let output = normalize_payment(json!({ "status": "settled", "settled_at": "2024-01-01T00:00:00Z" }), now())
            .unwrap();
        assert_eq!(output["status"], "SETTLED");
        assert_eq!(output["terminal"], true);
    }

    #[test]
    fn test_normalize_payment_rejects_non_object() {
        let result = normalize_payment(json!(["p1"]), now());
        assert!(matches!(result, Err(BridgeError::Decode(ref msg)) if msg.contains("array")));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_value(PaymentState::Settled).unwrap(), json!("SETTLED"));
        assert_eq!(PaymentState::Pending.to_string(), "PENDING");
        assert!(!PaymentState::Created.is_terminal());
        assert!(PaymentState::Expired.is_terminal());
    }

    fn timestamp_strategy() -> impl Strategy<Value = Option<String>> {
        prop::option::of((2000i32..2100, 1u32..=12, 1u32..=28, 0u32..24).prop_map(|(y, m, d, h)| {
            format!("{y:04}-{m:02}-{d:02}T{h:02}:00:00Z")
        }))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn test_normalization_is_total(
            status in prop::option::of("[A-Za-z _-]{0,24}"),
            settled_at in timestamp_strategy(),
            expires_at in timestamp_strategy(),
            error in prop::option::of("[a-z ]{0,12}"),
        ) {
            let mut object = Map::new();
            if let Some(status) = status {
                object.insert("status".to_owned(), json!(status));
            }
            if let Some(at) = &settled_at {
                object.insert("settled_at".to_owned(), json!(at));
            }
            if let Some(at) = expires_at {
                object.insert("expires_at".to_owned(), json!(at));
            }
            if let Some(error) = error {
                object.insert("error".to_owned(), json!(error));
            }

            let output = normalize_payment(Value::Object(object), now()).unwrap();
            let state: PaymentState = serde_json::from_value(output["status"].clone()).unwrap();

            if settled_at.is_some() {
                prop_assert_eq!(state, PaymentState::Settled);
            }
            prop_assert_eq!(output["terminal"].as_bool(), Some(state.is_terminal()));
        }
    }
}
