//! Audit logging for payment-affecting operations.
//!
//! Mutating operations (wallet creation and deletion, invoice generation and
//! payment) emit one event when attempted and one when they succeed or fail.
//! Events go to the `audit` tracing target so they can be routed separately.
//! BOLT11 strings are never logged in full.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{catalog::OperationId, error::ToolError, lifecycle::PaymentState};

/// Characters of a BOLT11 string kept at each end when redacting.
const BOLT11_VISIBLE_PREFIX: usize = 10;
const BOLT11_VISIBLE_SUFFIX: usize = 4;
/// Shortest token treated as a possible BOLT11 string by [`redact_sensitive`].
const BOLT11_MIN_TOKEN_LEN: usize = 20;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A mutating operation passed validation and is about to hit the backend.
    OperationAttempted,
    /// The backend accepted the operation.
    OperationSucceeded,
    /// The backend call failed.
    OperationFailed,
}

/// Contextual details of an audit event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Target wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    /// Amount in millisatoshis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_msat: Option<i64>,
    /// Redacted BOLT11 string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolt11: Option<String>,
    /// Normalized payment state after the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_state: Option<PaymentState>,
    /// Error kind and redacted message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the backend call in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Audit log entry.
///
/// # Examples
///
/// ```
/// use voltage_mcp_bridge::{
///     audit::{AuditEvent, AuditEventType, audit_log},
///     catalog::OperationId,
/// };
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::OperationAttempted, OperationId::PayBolt11Invoice, Uuid::new_v4())
///     .with_bolt11("lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypq");
///
/// assert!(!event.details.bolt11.as_deref().unwrap().contains("qqqsyq"));
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: SystemTime,
    /// What happened.
    pub event_type: AuditEventType,
    /// Operation tool name.
    pub operation: String,
    /// Correlation ID shared by the attempt and its outcome.
    pub request_id: Uuid,
    /// Event details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates a new audit event.
    #[must_use]
    pub fn new(event_type: AuditEventType, operation: OperationId, request_id: Uuid) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            operation: operation.name().to_owned(),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Adds the target wallet.
    #[must_use]
    #[allow(
        clippy::impl_trait_in_params,
        reason = "impl Into<String> is idiomatic for builder methods"
    )]
    pub fn with_wallet_id(mut self, wallet_id: impl Into<String>) -> Self {
        self.details.wallet_id = Some(wallet_id.into());
        self
    }

    /// Adds the amount in millisatoshis.
    #[must_use]
    pub const fn with_amount(mut self, amount_msat: i64) -> Self {
        self.details.amount_msat = Some(amount_msat);
        self
    }

    /// Adds a BOLT11 string, redacted.
    #[must_use]
    pub fn with_bolt11(mut self, bolt11: &str) -> Self {
        self.details.bolt11 = Some(redact_bolt11(bolt11));
        self
    }

    /// Adds the normalized payment state.
    #[must_use]
    pub const fn with_payment_state(mut self, state: PaymentState) -> Self {
        self.details.payment_state = Some(state);
        self
    }

    /// Adds an error, with sensitive data redacted from its message.
    #[must_use]
    pub fn with_error(mut self, error: &ToolError) -> Self {
        self.details.error = Some(format!("{}: {}", error.kind, redact_sensitive(&error.message)));
        self
    }

    /// Adds the duration of the backend call.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duration in ms fits u64 for practical values"
    )]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Logs an audit event to tracing with target `audit`.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        operation = %event.operation,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}

/// Shortens a BOLT11 string to its prefix and last characters.
///
/// The prefix identifies network and amount; the suffix is enough to
/// correlate with backend records.
///
/// # Examples
///
/// ```
/// use voltage_mcp_bridge::audit::redact_bolt11;
///
/// assert_eq!(
///     redact_bolt11("lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqypq"),
///     "lnbc2500u1...qypq"
/// );
/// assert_eq!(redact_bolt11("lnbc1short"), "lnbc1short");
/// ```
#[must_use]
pub fn redact_bolt11(bolt11: &str) -> String {
    let chars: Vec<char> = bolt11.chars().collect();
    if chars.len() <= BOLT11_VISIBLE_PREFIX + BOLT11_VISIBLE_SUFFIX {
        return bolt11.to_owned();
    }
    let prefix: String = chars[..BOLT11_VISIBLE_PREFIX].iter().collect();
    let suffix: String = chars[chars.len() - BOLT11_VISIBLE_SUFFIX..].iter().collect();
    format!("{prefix}...{suffix}")
}

/// Redacts BOLT11-looking tokens from free text such as backend error
/// messages.
///
/// # Examples
///
/// ```
/// use voltage_mcp_bridge::audit::redact_sensitive;
///
/// let msg = "invoice lnbc2500u1pvjluezpp5qqqsyqcyq5rqwzqfqypq already paid";
/// assert_eq!(redact_sensitive(msg), "invoice lnbc2500u1...qypq already paid");
/// ```
#[must_use]
pub fn redact_sensitive(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut token = String::new();

    let flush = |token: &mut String, output: &mut String| {
        if looks_like_bolt11(token) {
            output.push_str(&redact_bolt11(token));
        } else {
            output.push_str(token);
        }
        token.clear();
    };

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            token.push(c);
        } else {
            flush(&mut token, &mut output);
            output.push(c);
        }
    }
    flush(&mut token, &mut output);

    output
}

fn looks_like_bolt11(token: &str) -> bool {
    token.len() >= BOLT11_MIN_TOKEN_LEN
        && token.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("ln"))
}
