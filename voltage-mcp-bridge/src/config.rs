//! Credential context bound for the process lifetime.
//!
//! The context holds the four values every backend call needs: the API key,
//! the organization and environment identifiers that scope every wallet and
//! payment, and the backend base URL. It is built once at startup, wrapped in
//! an [`Arc`](std::sync::Arc) and shared read-only with the dispatcher and the
//! transport.
//!
//! # Environment Variables
//!
//! | Variable | Format |
//! |----------|--------|
//! | `API_KEY` | non-empty string |
//! | `ORGANIZATION_ID` | UUID |
//! | `ENVIRONMENT_ID` | UUID |
//! | `BASE_URL` | absolute `http`/`https` URL |

use std::{env, fmt};

use url::Url;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{BridgeError, Result};

/// Environment variable holding the backend API key.
pub const API_KEY_VAR: &str = "API_KEY";
/// Environment variable holding the organization UUID.
pub const ORGANIZATION_ID_VAR: &str = "ORGANIZATION_ID";
/// Environment variable holding the environment UUID.
pub const ENVIRONMENT_ID_VAR: &str = "ENVIRONMENT_ID";
/// Environment variable holding the backend base URL.
pub const BASE_URL_VAR: &str = "BASE_URL";

/// API key that is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// Wraps a raw key.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self(Zeroizing::new(key))
    }

    /// Returns the raw key for building request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Immutable credential set scoping every backend request.
///
/// # Examples
///
/// ```
/// use voltage_mcp_bridge::config::CredentialContext;
///
/// let ctx = CredentialContext::from_lookup(|name| match name {
///     "API_KEY" => Some("vltg_test".to_owned()),
///     "ORGANIZATION_ID" => Some("4a1c2f7e-9d3b-4c8e-a5f6-0b1d2e3f4a5b".to_owned()),
///     "ENVIRONMENT_ID" => Some("7e8f9a0b-1c2d-4e3f-8a9b-0c1d2e3f4a5b".to_owned()),
///     "BASE_URL" => Some("https://voltageapi.com/".to_owned()),
///     _ => None,
/// })?;
///
/// assert_eq!(ctx.base_url(), "https://voltageapi.com");
/// # Ok::<(), voltage_mcp_bridge::BridgeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CredentialContext {
    api_key: ApiKey,
    organization_id: Uuid,
    environment_id: Uuid,
    base_url: String,
}

impl CredentialContext {
    /// Builds a context from already-validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the API key is blank or the
    /// base URL is not an absolute `http`/`https` URL.
    pub fn new(
        api_key: ApiKey,
        organization_id: Uuid,
        environment_id: Uuid,
        base_url: &str,
    ) -> Result<Self> {
        if api_key.expose().trim().is_empty() {
            return Err(BridgeError::Configuration(format!("{API_KEY_VAR} is empty")));
        }
        let base_url = parse_base_url(base_url).map_err(BridgeError::Configuration)?;

        Ok(Self { api_key, organization_id, environment_id, base_url })
    }

    /// Loads the context from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] naming every variable that is
    /// missing, blank, or malformed.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the context through an arbitrary variable lookup.
    ///
    /// All four variables are checked before returning, so the error lists
    /// every problem at once.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if any variable is missing,
    /// blank, or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let mut read = |name: &str| -> Option<String> {
            match lookup(name).map(|value| value.trim().to_owned()) {
                Some(value) if !value.is_empty() => Some(value),
                _ => {
                    problems.push(format!("{name} is not set"));
                    None
                }
            }
        };

        let api_key = read(API_KEY_VAR);
        let organization_id = read(ORGANIZATION_ID_VAR);
        let environment_id = read(ENVIRONMENT_ID_VAR);
        let base_url = read(BASE_URL_VAR);

        let organization_id = organization_id.and_then(|raw| {
            parse_uuid(ORGANIZATION_ID_VAR, &raw).map_err(|e| problems.push(e)).ok()
        });
        let environment_id = environment_id.and_then(|raw| {
            parse_uuid(ENVIRONMENT_ID_VAR, &raw).map_err(|e| problems.push(e)).ok()
        });
        let base_url = base_url.and_then(|raw| parse_base_url(&raw).map_err(|e| problems.push(e)).ok());

        match (api_key, organization_id, environment_id, base_url) {
            (Some(api_key), Some(organization_id), Some(environment_id), Some(base_url))
                if problems.is_empty() =>
            {
                Ok(Self { api_key: ApiKey::new(api_key), organization_id, environment_id, base_url })
            }
            _ => Err(BridgeError::Configuration(problems.join("; "))),
        }
    }

    /// Returns the API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the organization every wallet belongs to.
    #[must_use]
    pub const fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    /// Returns the environment every payment belongs to.
    #[must_use]
    pub const fn environment_id(&self) -> Uuid {
        self.environment_id
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_uuid(name: &str, raw: &str) -> std::result::Result<Uuid, String> {
    Uuid::parse_str(raw).map_err(|e| format!("{name} is not a valid UUID: {e}"))
}

fn parse_base_url(raw: &str) -> std::result::Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("{BASE_URL_VAR} is not a valid URL: {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{BASE_URL_VAR} must use http or https, got: {}", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("{BASE_URL_VAR} is missing a host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(format!("{BASE_URL_VAR} must not carry a query or fragment"));
    }

    Ok(raw.trim().trim_end_matches('/').to_owned())
}
