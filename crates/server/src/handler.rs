//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    CacheGetParams, WorkerFetchParams, WorkerMessageParams, activate_impl, fetch_impl, get_impl, install_impl,
    message_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_core::Worker;

/// The main MCP server handler for the shellcache worker.
///
/// The host platform delivers lifecycle events, intercepted requests and
/// control messages as tool calls.
#[derive(Clone)]
pub struct ShellcacheServer {
    worker: Worker,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellcacheServer {
    /// Create a new server handler for `worker`.
    pub fn new(worker: Worker) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(description = "Install the worker: stage the application shell. Fails and marks the worker redundant if any shell resource cannot be fetched.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the worker: reconcile the content cache against the resource manifest and start serving.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    #[tool(description = "Deliver an intercepted request. Returns the response the worker serves, or passthrough when the platform should fetch natively.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a control message to the worker: skipWaiting or downloadOffline.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report the worker state, manifest size and key count of each cache store.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "Read a stored response from the content cache by URL without fetching.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache-worker".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
