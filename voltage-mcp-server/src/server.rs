//! MCP server handler exposing the operation catalog as tools.

use std::sync::Arc;

use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use tracing::debug;
use voltage_mcp_bridge::{Dispatcher, ToolCall, catalog, transport::Transport};

const INSTRUCTIONS: &str = "Lightning payments through Voltage. Wallets and payments are scoped \
    to the configured organization and environment; never pass organization_id or \
    environment_id. generate_bolt11_invoice returns immediately: poll check_payment_status \
    until the status is SETTLED, EXPIRED or FAILED. pay_bolt11_invoice is not idempotent.";

/// MCP handler backed by a [`Dispatcher`].
#[derive(Debug)]
pub struct VoltageServer<T> {
    dispatcher: Arc<Dispatcher<T>>,
    tools: Arc<[Tool]>,
}

impl<T> Clone for VoltageServer<T> {
    fn clone(&self) -> Self {
        Self { dispatcher: Arc::clone(&self.dispatcher), tools: Arc::clone(&self.tools) }
    }
}

impl<T: Transport + 'static> VoltageServer<T> {
    /// Creates a handler; the tool list is rendered once from the catalog.
    #[must_use]
    pub fn new(dispatcher: Dispatcher<T>) -> Self {
        Self { dispatcher: Arc::new(dispatcher), tools: catalog_tools().into() }
    }

    /// Runs one tool call and wraps the response envelope as tool content.
    ///
    /// The envelope is returned as JSON text; the error branch sets
    /// `isError`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorData`] only if the envelope cannot be serialized.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> Result<CallToolResult, ErrorData> {
        let response = self.dispatcher.handle(ToolCall::new(name, arguments.unwrap_or_default())).await;
        let text = serde_json::to_string(&response)
            .map_err(|e| ErrorData::internal_error(format!("cannot encode tool response: {e}"), None))?;

        if response.is_error() {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
    }

    /// Returns the tools advertised by `tools/list`.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.to_vec()
    }
}

impl<T: Transport + 'static> ServerHandler for VoltageServer<T> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_owned()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = %request.name, "tools/call");
        self.call(&request.name, request.arguments).await
    }
}

/// Renders every catalog descriptor as an MCP tool.
fn catalog_tools() -> Vec<Tool> {
    catalog::descriptors()
        .map(|descriptor| Tool::new(descriptor.name, descriptor.description, Arc::new(descriptor.input_schema())))
        .collect()
}
