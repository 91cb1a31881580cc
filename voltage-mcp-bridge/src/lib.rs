//! Voltage MCP Bridge: Lightning payments for AI agents
//!
//! A Rust library that exposes the Voltage Lightning payments API as a fixed
//! catalog of tool operations, so an MCP-compatible agent can manage wallets,
//! issue BOLT11 invoices, pay invoices, and track payment state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AI Agent      │  MCP-compatible agent
//! └────────┬────────┘
//!          │ tools/call {operation_name, arguments}
//!          │
//! ┌────────▼────────────────────────────────────────┐
//! │          Voltage MCP Bridge (this crate)        │
//! │  ┌────────────┐  ┌────────────┐  ┌───────────┐ │
//! │  │  Catalog   │──│ Dispatcher │──│ Lifecycle │ │
//! │  │ (schemas)  │  │ (validate, │  │ (status   │ │
//! │  │            │  │  render)   │  │ normalize)│ │
//! │  └────────────┘  └─────┬──────┘  └───────────┘ │
//! │                        │ Transport              │
//! └────────────────────────┼────────────────────────┘
//!                          │ HTTPS + API key
//! ┌────────────────────────▼┐
//! │   Voltage payments API  │  organization / environment scoped
//! └─────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use voltage_mcp_bridge::{
//!     CredentialContext, Dispatcher,
//!     transport::{HttpConfig, HttpTransport},
//! };
//!
//! # async fn example() -> voltage_mcp_bridge::Result<()> {
//! // API_KEY, ORGANIZATION_ID, ENVIRONMENT_ID and BASE_URL
//! let context = Arc::new(CredentialContext::load()?);
//! let transport = HttpTransport::new(Arc::clone(&context), &HttpConfig::default())?;
//! let dispatcher = Dispatcher::new(context, transport);
//!
//! let arguments = json!({
//!     "wallet_id": "0f1e2d3c-4b5a-4968-8776-a5b4c3d2e1f0",
//!     "amount": 150_000
//! });
//! let invoice = dispatcher
//!     .dispatch("generate_bolt11_invoice", arguments.as_object().unwrap_or(&Default::default()))
//!     .await?;
//!
//! println!("status: {}", invoice["status"]);
//! println!("bolt11: {}", invoice["bolt11"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`config`]: Credential context loaded from the environment
//! - [`catalog`]: The static operation catalog and argument validation
//! - [`dispatch`]: Tool-call dispatcher and response envelope
//! - [`lifecycle`]: Payment status normalization
//! - [`transport`]: Backend transport abstraction and the reqwest implementation
//! - [`audit`]: Audit events for payment-affecting operations
//! - [`error`]: Error taxonomy
//!
//! # Error Handling
//!
//! All operations return [`Result<T, BridgeError>`](error::Result). Each
//! variant maps to a stable kind name that calling agents branch on:
//!
//! ```rust
//! use voltage_mcp_bridge::BridgeError;
//!
//! fn advise(err: &BridgeError) -> &'static str {
//!     match err {
//!         BridgeError::Validation(_) | BridgeError::UnknownOperation(_) => "fix the call",
//!         BridgeError::Http { status: 401 | 403, .. } => "check API_KEY",
//!         _ if err.is_retryable() => "try again later",
//!         _ => "report it",
//!     }
//! }
//!
//! let err = BridgeError::Http { status: 503, backend_message: "maintenance".to_owned() };
//! assert_eq!(err.kind().as_str(), "HTTPError");
//! assert_eq!(advise(&err), "try again later");
//! ```
//!
//! # Payment Safety
//!
//! - Mutating operations are never retried or deduplicated by this crate
//! - Validation runs before any network call and reports every violation
//! - `organization_id` and `environment_id` always come from the credential
//!   context, never from the caller
//! - The API key is zeroized on drop and redacted from `Debug` output
//! - Full BOLT11 strings are never written to logs

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

pub mod audit;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod transport;

pub use catalog::{OperationDescriptor, OperationId};
pub use config::CredentialContext;
pub use dispatch::{Dispatcher, ToolCall, ToolResponse};
pub use error::{BridgeError, ErrorKind, Result, ToolError};
pub use lifecycle::PaymentState;
