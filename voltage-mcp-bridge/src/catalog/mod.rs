//! Static operation catalog.
//!
//! The catalog is the closed set of payment operations an agent may invoke.
//! Each [`OperationId`] maps to one [`OperationDescriptor`] declaring its
//! parameter schema, request template and response shape. Nothing is
//! registered at runtime.
//!
//! # Operations
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | `get_all_wallets` | GET | `/organizations/{org}/wallets` |
//! | `create_wallet` | POST | `/organizations/{org}/wallets` |
//! | `get_wallet` | GET | `/organizations/{org}/wallets/{wallet_id}` |
//! | `delete_wallet` | DELETE | `/organizations/{org}/wallets/{wallet_id}` |
//! | `get_wallet_ledger_as_user` | GET | `/organizations/{org}/wallets/{wallet_id}/ledger` |
//! | `get_payments` | GET | `/organizations/{org}/environments/{env}/payments` |
//! | `check_payment_status` | GET | `/organizations/{org}/environments/{env}/payments/{payment_id}` |
//! | `generate_bolt11_invoice` | POST | `/organizations/{org}/environments/{env}/payments` |
//! | `pay_bolt11_invoice` | POST | `/organizations/{org}/environments/{env}/payments` |
//!
//! # Examples
//!
//! ```
//! use voltage_mcp_bridge::catalog::{self, OperationId};
//!
//! let descriptor = catalog::lookup("get_wallet").unwrap();
//! assert_eq!(descriptor.id, OperationId::GetWallet);
//! assert!(!descriptor.mutating);
//! ```

use std::fmt;

use serde_json::{Map, Value};

pub mod params;

pub use params::{ParamKind, ParamSpec, ValidatedArgs, input_schema, validate_arguments};

use crate::{
    config::CredentialContext,
    transport::{ApiRequest, HttpMethod},
};

/// Identity of a catalog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    /// List every wallet in the organization and environment.
    GetAllWallets,
    /// Create a wallet.
    CreateWallet,
    /// Fetch one wallet.
    GetWallet,
    /// Delete one wallet.
    DeleteWallet,
    /// Read a wallet's ledger.
    GetWalletLedgerAsUser,
    /// List payments.
    GetPayments,
    /// Fetch one payment.
    CheckPaymentStatus,
    /// Create a receive invoice.
    GenerateBolt11Invoice,
    /// Pay an invoice.
    PayBolt11Invoice,
}

impl OperationId {
    /// Every operation, in catalog order.
    pub const ALL: [Self; 9] = [
        Self::GetAllWallets,
        Self::CreateWallet,
        Self::GetWallet,
        Self::DeleteWallet,
        Self::GetWalletLedgerAsUser,
        Self::GetPayments,
        Self::CheckPaymentStatus,
        Self::GenerateBolt11Invoice,
        Self::PayBolt11Invoice,
    ];

    /// Returns the descriptor for this operation.
    #[must_use]
    pub const fn descriptor(self) -> &'static OperationDescriptor {
        match self {
            Self::GetAllWallets => &GET_ALL_WALLETS,
            Self::CreateWallet => &CREATE_WALLET,
            Self::GetWallet => &GET_WALLET,
            Self::DeleteWallet => &DELETE_WALLET,
            Self::GetWalletLedgerAsUser => &GET_WALLET_LEDGER,
            Self::GetPayments => &GET_PAYMENTS,
            Self::CheckPaymentStatus => &CHECK_PAYMENT_STATUS,
            Self::GenerateBolt11Invoice => &GENERATE_BOLT11_INVOICE,
            Self::PayBolt11Invoice => &PAY_BOLT11_INVOICE,
        }
    }

    /// Returns the tool name of this operation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the credential scope is placed in the rendered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Path prefixed with `/organizations/{organization_id}`.
    Organization,
    /// Organization prefix, plus `environment_id` as a query parameter (GET)
    /// or body field (POST).
    OrganizationWithEnvironmentField,
    /// Path prefixed with
    /// `/organizations/{organization_id}/environments/{environment_id}`.
    Environment,
}

/// Expected shape of a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// List of wallets.
    WalletList,
    /// Single wallet object.
    Wallet,
    /// List of ledger entries.
    Ledger,
    /// List of payments, each normalized by the lifecycle tracker.
    PaymentList,
    /// Single payment, normalized by the lifecycle tracker.
    Payment,
    /// Deletion acknowledgement; any body is accepted.
    Deleted,
}

impl ResponseShape {
    /// Returns `true` for shapes that carry a list.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::WalletList | Self::Ledger | Self::PaymentList)
    }

    /// Returns `true` for shapes whose entries are payments.
    #[must_use]
    pub const fn is_payment(self) -> bool {
        matches!(self, Self::PaymentList | Self::Payment)
    }
}

/// Static description of one operation.
#[derive(Debug, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// Operation identity.
    pub id: OperationId,
    /// Tool name.
    pub name: &'static str,
    /// Description shown to the agent.
    pub description: &'static str,
    /// HTTP method.
    pub method: HttpMethod,
    /// Credential scope placement.
    pub scope: Scope,
    /// Path template below the scope prefix; `{param}` placeholders name path
    /// parameters.
    pub path: &'static str,
    /// Declared parameters, in order.
    pub params: &'static [ParamSpec],
    /// Body fields always sent with the request.
    pub fixed_body: &'static [(&'static str, &'static str)],
    /// Expected response shape.
    pub response: ResponseShape,
    /// Whether the operation changes backend state.
    pub mutating: bool,
}

impl OperationDescriptor {
    /// Returns `true` if `param` is substituted into the path.
    fn in_path(&self, param: &str) -> bool {
        self.path
            .split('/')
            .any(|segment| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) == Some(param))
    }

    /// Renders the JSON Schema of this operation's arguments.
    #[must_use]
    pub fn input_schema(&self) -> Map<String, Value> {
        input_schema(self.params)
    }

    /// Renders the backend request for already-validated arguments.
    ///
    /// Path parameters are substituted into the template. Remaining
    /// arguments go to the query string for GET and DELETE, and to the JSON
    /// body for POST. Scoping identifiers always come from `context`.
    #[must_use]
    pub fn render(&self, context: &CredentialContext, args: &ValidatedArgs) -> ApiRequest {
        let organization_id = context.organization_id().to_string();
        let environment_id = context.environment_id().to_string();

        let mut path = match self.scope {
            Scope::Organization | Scope::OrganizationWithEnvironmentField => {
                format!("/organizations/{organization_id}")
            }
            Scope::Environment => {
                format!("/organizations/{organization_id}/environments/{environment_id}")
            }
        };

        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(param) => path.push_str(&args.get(param).map(scalar_text).unwrap_or_default()),
                None => path.push_str(segment),
            }
        }

        let rest = args.iter().filter(|(name, _)| !self.in_path(name));
        let inject_environment = self.scope == Scope::OrganizationWithEnvironmentField;

        match self.method {
            HttpMethod::Get | HttpMethod::Delete => {
                let mut query: Vec<(String, String)> =
                    rest.map(|(name, value)| (name.to_owned(), scalar_text(value))).collect();
                if inject_environment {
                    query.insert(0, ("environment_id".to_owned(), environment_id));
                }
                ApiRequest::new(self.method, path).with_query(query)
            }
            HttpMethod::Post => {
                let mut body = Map::new();
                if inject_environment {
                    body.insert("environment_id".to_owned(), Value::String(environment_id));
                }
                for (name, value) in self.fixed_body {
                    body.insert((*name).to_owned(), Value::String((*value).to_owned()));
                }
                for (name, value) in rest {
                    body.insert(name.to_owned(), value.clone());
                }
                ApiRequest::new(self.method, path).with_body(Value::Object(body))
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Looks up an operation by tool name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static OperationDescriptor> {
    OperationId::ALL.iter().map(|id| id.descriptor()).find(|descriptor| descriptor.name == name)
}

/// Returns every operation descriptor in catalog order.
pub fn descriptors() -> impl Iterator<Item = &'static OperationDescriptor> {
    OperationId::ALL.iter().map(|id| id.descriptor())
}

/// Returns every tool name in catalog order.
#[must_use]
pub fn operation_names() -> Vec<&'static str> {
    descriptors().map(|descriptor| descriptor.name).collect()
}

const WALLET_ID: ParamSpec =
    ParamSpec::required("wallet_id", ParamKind::Uuid, "Wallet UUID");
const LIMIT: ParamSpec = ParamSpec::optional(
    "limit",
    ParamKind::Integer { min: 1, max: Some(1000) },
    "Maximum number of entries to return (1-1000)",
);
const OFFSET: ParamSpec = ParamSpec::optional(
    "offset",
    ParamKind::Integer { min: 0, max: None },
    "Number of entries to skip",
);

/// Filter values accepted by `get_payments`.
pub const PAYMENT_STATUS_FILTERS: &[&str] = &["created", "pending", "settled", "expired", "failed"];

static GET_ALL_WALLETS: OperationDescriptor = OperationDescriptor {
    id: OperationId::GetAllWallets,
    name: "get_all_wallets",
    description: "List every wallet in the configured organization and environment.",
    method: HttpMethod::Get,
    scope: Scope::OrganizationWithEnvironmentField,
    path: "/wallets",
    params: &[],
    fixed_body: &[],
    response: ResponseShape::WalletList,
    mutating: false,
};

static CREATE_WALLET: OperationDescriptor = OperationDescriptor {
    id: OperationId::CreateWallet,
    name: "create_wallet",
    description: "Create a new Lightning wallet in the configured environment.",
    method: HttpMethod::Post,
    scope: Scope::OrganizationWithEnvironmentField,
    path: "/wallets",
    params: &[
        ParamSpec::required(
            "name",
            ParamKind::Text { max_len: 256, non_blank: true },
            "Human-readable wallet name",
        ),
        ParamSpec::optional("metadata", ParamKind::Object, "Arbitrary JSON metadata stored with the wallet"),
    ],
    fixed_body: &[],
    response: ResponseShape::Wallet,
    mutating: true,
};

static GET_WALLET: OperationDescriptor = OperationDescriptor {
    id: OperationId::GetWallet,
    name: "get_wallet",
    description: "Fetch a single wallet, including its balances.",
    method: HttpMethod::Get,
    scope: Scope::Organization,
    path: "/wallets/{wallet_id}",
    params: &[WALLET_ID],
    fixed_body: &[],
    response: ResponseShape::Wallet,
    mutating: false,
};

static DELETE_WALLET: OperationDescriptor = OperationDescriptor {
    id: OperationId::DeleteWallet,
    name: "delete_wallet",
    description: "Delete a wallet. This cannot be undone.",
    method: HttpMethod::Delete,
    scope: Scope::Organization,
    path: "/wallets/{wallet_id}",
    params: &[WALLET_ID],
    fixed_body: &[],
    response: ResponseShape::Deleted,
    mutating: true,
};

static GET_WALLET_LEDGER: OperationDescriptor = OperationDescriptor {
    id: OperationId::GetWalletLedgerAsUser,
    name: "get_wallet_ledger_as_user",
    description: "Read the ledger of balance-affecting events for a wallet.",
    method: HttpMethod::Get,
    scope: Scope::Organization,
    path: "/wallets/{wallet_id}/ledger",
    params: &[WALLET_ID, OFFSET, LIMIT],
    fixed_body: &[],
    response: ResponseShape::Ledger,
    mutating: false,
};

static GET_PAYMENTS: OperationDescriptor = OperationDescriptor {
    id: OperationId::GetPayments,
    name: "get_payments",
    description: "List payments in the configured environment, optionally filtered.",
    method: HttpMethod::Get,
    scope: Scope::Environment,
    path: "/payments",
    params: &[
        ParamSpec::optional("wallet_id", ParamKind::Uuid, "Only payments of this wallet"),
        ParamSpec::optional(
            "status",
            ParamKind::OneOf(PAYMENT_STATUS_FILTERS),
            "Only payments in this state",
        ),
        LIMIT,
        OFFSET,
    ],
    fixed_body: &[],
    response: ResponseShape::PaymentList,
    mutating: false,
};

static CHECK_PAYMENT_STATUS: OperationDescriptor = OperationDescriptor {
    id: OperationId::CheckPaymentStatus,
    name: "check_payment_status",
    description: "Fetch the current state of a payment or invoice.",
    method: HttpMethod::Get,
    scope: Scope::Environment,
    path: "/payments/{payment_id}",
    params: &[ParamSpec::required("payment_id", ParamKind::Identifier, "Payment identifier")],
    fixed_body: &[],
    response: ResponseShape::Payment,
    mutating: false,
};

static GENERATE_BOLT11_INVOICE: OperationDescriptor = OperationDescriptor {
    id: OperationId::GenerateBolt11Invoice,
    name: "generate_bolt11_invoice",
    description: "Create a BOLT11 invoice to receive a payment into a wallet. \
                  Returns immediately; poll check_payment_status for settlement.",
    method: HttpMethod::Post,
    scope: Scope::Environment,
    path: "/payments",
    params: &[
        WALLET_ID,
        ParamSpec::required(
            "amount",
            ParamKind::Integer { min: 1, max: None },
            "Amount in millisatoshis",
        ),
        ParamSpec::optional(
            "description",
            ParamKind::Text { max_len: 639, non_blank: false },
            "Invoice description",
        ),
    ],
    fixed_body: &[("payment_kind", "bolt11"), ("direction", "receive")],
    response: ResponseShape::Payment,
    mutating: true,
};

static PAY_BOLT11_INVOICE: OperationDescriptor = OperationDescriptor {
    id: OperationId::PayBolt11Invoice,
    name: "pay_bolt11_invoice",
    description: "Pay a BOLT11 invoice from a wallet. Not idempotent: every call \
                  sends a new payment request.",
    method: HttpMethod::Post,
    scope: Scope::Environment,
    path: "/payments",
    params: &[
        WALLET_ID,
        ParamSpec::required("bolt11", ParamKind::Bolt11, "BOLT11 payment request"),
        ParamSpec::optional(
            "amount",
            ParamKind::Integer { min: 1, max: None },
            "Amount in millisatoshis, for invoices without an amount",
        ),
    ],
    fixed_body: &[("payment_kind", "bolt11"), ("direction", "send")],
    response: ResponseShape::Payment,
    mutating: true,
};
