//! HTTP transport configuration.
//!
//! Settings are TOML-deserializable and every field has a default, so an
//! empty file (or no file at all) yields a working configuration.
//!
//! # Examples
//!
//! ```toml
//! timeout_secs = 20
//! connect_timeout_secs = 5
//! auth_scheme = "bearer"
//! ```

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// How the API key is attached to backend requests.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `X-API-Key: <key>`.
    #[default]
    ApiKey,
    /// `Authorization: Bearer <key>`.
    Bearer,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Path prefix inserted between the base URL and every operation path.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Authentication header scheme.
    #[serde(default)]
    pub auth_scheme: AuthScheme,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_max_idle(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            api_prefix: default_api_prefix(),
            auth_scheme: AuthScheme::default(),
        }
    }
}

impl HttpConfig {
    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] on invalid TOML or
    /// out-of-range values.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)
            .map_err(|e| BridgeError::Configuration(format!("invalid HTTP config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the file cannot be read or
    /// its content is invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Validates configuration values are within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if:
    /// - `timeout_secs` is outside 1-300
    /// - `connect_timeout_secs` is outside 1-60
    /// - `api_prefix` is non-empty and does not start with `/`, or ends with `/`
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(BridgeError::Configuration(
                "timeout_secs must be between 1 and 300".to_owned(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(BridgeError::Configuration(
                "connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        if !self.api_prefix.is_empty()
            && (!self.api_prefix.starts_with('/') || self.api_prefix.ends_with('/'))
        {
            return Err(BridgeError::Configuration(
                "api_prefix must start with '/' and must not end with '/'".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns connect timeout as Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn default_pool_max_idle() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_api_prefix() -> String {
    "/api/v1".to_owned()
}
