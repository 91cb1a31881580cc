//! Voltage MCP Server - MCP stdio server for Lightning payments
//!
//! Exposes the Voltage payment operation catalog as MCP tools over stdio.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `API_KEY` | yes | Voltage API key |
//! | `ORGANIZATION_ID` | yes | Organization UUID |
//! | `ENVIRONMENT_ID` | yes | Environment UUID |
//! | `BASE_URL` | yes | Backend base URL, e.g. `https://voltageapi.com` |
//! | `VOLTAGE_HTTP_CONFIG` | no | Path to a TOML file with HTTP transport settings |
//! | `RUST_LOG` | no | Log filter (default: `info`) |
//! | `LOG_FORMAT` | no | `pretty` or `json` |

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from rmcp and reqwest"
)]

use std::{env, path::Path, process::ExitCode, sync::Arc};

use rmcp::{ServiceExt, transport::stdio};
use tracing::{error, info};
use voltage_mcp_bridge::{
    CredentialContext, Dispatcher, Result, catalog,
    transport::{HttpConfig, HttpTransport},
};

mod observability;
mod server;

use observability::{LogFormat, init_observability};
use server::VoltageServer;

/// Environment variable naming the optional HTTP settings file.
const HTTP_CONFIG_VAR: &str = "VOLTAGE_HTTP_CONFIG";

/// Builds the dispatcher from the process environment.
fn build_dispatcher() -> Result<Dispatcher<HttpTransport>> {
    let context = Arc::new(CredentialContext::load()?);

    let http_config = match env::var(HTTP_CONFIG_VAR) {
        Ok(path) if !path.trim().is_empty() => HttpConfig::from_file(Path::new(path.trim()))?,
        _ => HttpConfig::default(),
    };

    let transport = HttpTransport::new(Arc::clone(&context), &http_config)?;

    info!(
        organization_id = %context.organization_id(),
        environment_id = %context.environment_id(),
        base_url = context.base_url(),
        auth_scheme = ?http_config.auth_scheme,
        "credential context loaded"
    );

    Ok(Dispatcher::new(context, transport))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    let dispatcher = match build_dispatcher() {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!(error = %err, kind = %err.kind(), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    info!(tools = catalog::operation_names().len(), "serving MCP over stdio");

    let service = match VoltageServer::new(dispatcher).serve(stdio()).await {
        Ok(service) => service,
        Err(err) => {
            error!(error = %err, "MCP initialization failed");
            return ExitCode::FAILURE;
        }
    };

    match service.waiting().await {
        Ok(reason) => {
            info!(reason = ?reason, "MCP session ended");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "MCP service task failed");
            ExitCode::FAILURE
        }
    }
}
