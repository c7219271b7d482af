//! MCP service implementation using rmcp.
//!
//! Tool names are generated per instance (`<prefix>_<operation>`), so the
//! handler lists and routes tools by hand instead of through the
//! `#[tool_router]` macros.

use crate::tools::{Dispatcher, take_confirm};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct DbService {
    dispatcher: Arc<Dispatcher>,
}

impl DbService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Tools as advertised by `tools/list`.
    pub fn tools(&self) -> Result<Vec<Tool>, McpError> {
        Ok(self
            .dispatcher
            .tools()?
            .into_iter()
            .map(|t| Tool::new(t.name, t.description, Arc::new(t.input_schema)))
            .collect())
    }

    fn instructions(&self) -> String {
        let mut text = String::from(
            "Database administration tools. Every tool is named <instance>_<operation>.\n\
             \n\
             ## Rules\n\
             - Destructive operations (drop_*, truncate_table, unfiltered delete_rows, \
             destructive execute_query) first return a preview. Resend the identical call \
             with \"confirm\": true to run it.\n\
             - Read-only instances reject every write.\n\
             - Only the schemas listed per instance may be touched.\n\
             - Row results are capped at each instance's max_rows.\n\
             \n\
             ## Instances\n",
        );
        for instance in self.dispatcher.registry().instances() {
            text.push_str(&format!(
                "- {} [{}]: {}, {}, schemas: {}, max_rows: {}\n",
                instance.prefix,
                instance.label,
                instance.db_type.display_name(),
                if instance.read_only {
                    "read-only"
                } else {
                    "read-write"
                },
                instance.allowed_schemas,
                instance.max_rows,
            ));
        }
        text
    }
}

impl ServerHandler for DbService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                title: Some("Database Admin MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = self.tools()?;
        debug!(count = tools.len(), "Listing tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let mut args = request.arguments.unwrap_or_default();
        let confirmed = take_confirm(&mut args)?;
        let text = self
            .dispatcher
            .handle(&request.name, args, confirmed, &context.ct)
            .await?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
