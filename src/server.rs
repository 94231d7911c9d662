//! MCP server implementation using rmcp.

use crate::services::{Dispatcher, HttpBackend};
use crate::tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler};
use serde::Serialize;
use std::time::Duration;

/// Maximum response size in bytes. Responses exceeding this are truncated
/// to prevent context window exhaustion in LLM consumers.
const MAX_RESPONSE_BYTES: usize = 256 * 1024; // 256KB

/// Truncates a JSON response string at a clean boundary before the limit,
/// appending a truncation notice.
fn truncate_response(mut json: String) -> String {
    if json.len() <= MAX_RESPONSE_BYTES {
        return json;
    }
    let original_len = json.len();
    let limit = json.floor_char_boundary(MAX_RESPONSE_BYTES);
    // Last comma is the nearest record boundary
    let search_region = &json[..limit];
    let cut_point = search_region
        .rfind(',')
        .or_else(|| search_region.rfind('\n'))
        .unwrap_or(limit);
    let safe_cut = json.floor_char_boundary(cut_point + 1);
    json.truncate(safe_cut);
    json.push_str(&format!(
        "...\n[TRUNCATED: response exceeded {original_len} bytes, showing first {safe_cut}]"
    ));
    json
}

/// Serializes a tool result into an MCP success or tool-error result.
fn tool_result<T: Serialize>(result: Result<T, String>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(output) => {
            let json = serde_json::to_string(&output)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(truncate_response(
                json,
            ))]))
        }
        Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
    }
}

/// MCP front-end over one dispatcher.
#[derive(Clone)]
pub struct TypeaheadServer {
    dispatcher: Dispatcher<HttpBackend>,
    /// Upper bound on how long `search` waits for a delivery
    wait: Duration,
    tool_router: ToolRouter<Self>,
}

impl TypeaheadServer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher<HttpBackend>, wait: Duration) -> Self {
        Self {
            dispatcher,
            wait,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl TypeaheadServer {
    #[tool(description = "Search a content category and wait for the results.\n\n\
        Categories: courses, instructors, lessons, posts. Queries shorter than the \
        configured minimum (default 2 chars) are rejected.\n\
        Identical searches are deduplicated and recent results are served from cache.\n\
        outcome=exhausted means the backend failed on every retry.")]
    async fn search(
        &self,
        Parameters(input): Parameters<tools::SearchInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let input = tools::SearchInput {
            limit: input.limit.min(200),
            ..input
        };
        tool_result(tools::execute_search(&self.dispatcher, input, self.wait).await)
    }

    #[tool(description = "Get the results currently shown for a category \
        (the latest delivery for its most recent query).")]
    async fn results(
        &self,
        Parameters(input): Parameters<tools::ResultsInput>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(Ok(tools::execute_results(&self.dispatcher, input)))
    }

    #[tool(description = "Cancel a queued, running or retrying search.")]
    async fn cancel(
        &self,
        Parameters(input): Parameters<tools::CancelInput>,
    ) -> Result<CallToolResult, ErrorData> {
        tool_result(Ok(tools::execute_cancel(&self.dispatcher, input)))
    }

    #[tool(description = "Get dispatcher status: pending, active, retrying and cached \
        counts plus completed/exhausted totals.")]
    async fn status(&self) -> Result<CallToolResult, ErrorData> {
        tool_result(Ok(tools::execute_status(&self.dispatcher)))
    }
}

#[tool_handler]
impl ServerHandler for TypeaheadServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "typeahead: incremental search over courses, instructors, lessons and posts.\n\n\
             WORKFLOW:\n\
             1. search -> results for a query (waits up to {}s)\n\
             2. results -> what is currently shown for a category\n\
             3. status -> queue and cache health\n\n\
             Records are opaque JSON objects returned by the content backend.",
            self.wait.as_secs()
        );

        ServerInfo {
            instructions: Some(instructions),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
