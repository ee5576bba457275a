//! # Mirel MCP Server
//!
//! Implements `ServerHandler` with 7 MCP tools that proxy to the Mirel HTTP API.

use crate::client::{ClientError, MirelClient};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::Value;

/// Render a client call as an MCP text result; client errors become MCP
/// internal errors.
fn reply(
    result: Result<Value, ClientError>,
    render: impl FnOnce(&Value) -> String,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(resp) => Ok(CallToolResult::success(vec![Content::text(render(&resp))])),
        Err(e) => Err(McpError::internal_error(e.to_string(), None)),
    }
}

// =============================================================================
// BRIDGE STATE
// =============================================================================

/// MCP server that bridges to a Mirel HTTP API.
#[derive(Clone)]
pub struct MirelMcp {
    client: MirelClient,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

// =============================================================================
// TOOL PARAMETERS
// =============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetParams {
    /// The link ID to fetch.
    #[schemars(description = "The link ID to fetch")]
    pub id: u64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// Recursive predicate object.
    #[schemars(
        description = "Predicate object, e.g. {\"type_id\": 3, \"from\": {\"id\": {\"_gt\": 2}}}"
    )]
    pub predicate: Value,
    /// Maximum number of links to return.
    #[schemars(description = "Maximum number of links to return")]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InsertParams {
    /// The new link's ID (must be unused).
    #[schemars(description = "The new link's ID (must be unused)")]
    pub id: u64,
    /// Optional type reference.
    #[schemars(description = "Optional type reference (ID of the type link)")]
    pub type_id: Option<u64>,
    /// Optional source endpoint; set together with to_id to make an edge.
    #[schemars(description = "Optional source endpoint ID (makes this link an edge)")]
    pub from_id: Option<u64>,
    /// Optional target endpoint.
    #[schemars(description = "Optional target endpoint ID")]
    pub to_id: Option<u64>,
    /// Optional JSON object of attributes.
    #[schemars(description = "Optional JSON object of attributes")]
    pub props: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateParams {
    /// The link ID to update.
    #[schemars(description = "The link ID to update")]
    pub id: u64,
    /// Patch object applied to the link.
    #[schemars(
        description = "Patch object: type_id/from_id/to_id take an ID or null (clear); \
                       any other key sets an attribute, null removes it"
    )]
    pub set: Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteParams {
    /// The link ID to delete.
    #[schemars(description = "The link ID to delete")]
    pub id: u64,
}

// =============================================================================
// TOOLS
// =============================================================================

#[tool_router]
impl MirelMcp {
    pub fn new(client: MirelClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get mirror statistics (link count, reference resolution, type count)")]
    async fn mirel_status(&self) -> Result<CallToolResult, McpError> {
        reply(self.client.status().await, format_status)
    }

    #[tool(description = "Fetch one link by ID with its resolved references and adjacency")]
    async fn mirel_get(
        &self,
        params: Parameters<GetParams>,
    ) -> Result<CallToolResult, McpError> {
        reply(self.client.get_link(params.0.id).await, format_link_detail)
    }

    #[tool(
        description = "Query links with a recursive predicate (field comparisons and type/from/to relations)"
    )]
    async fn mirel_query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let QueryParams { predicate, limit } = params.0;
        reply(
            self.client.query(predicate, limit).await,
            format_query_response,
        )
    }

    #[tool(description = "Insert a new link (a node or a typed directed edge) into the mirror")]
    async fn mirel_insert(
        &self,
        params: Parameters<InsertParams>,
    ) -> Result<CallToolResult, McpError> {
        let InsertParams {
            id,
            type_id,
            from_id,
            to_id,
            props,
        } = params.0;

        let mut link = serde_json::Map::new();
        link.insert("id".to_string(), serde_json::json!(id));
        if let Some(type_id) = type_id {
            link.insert("type_id".to_string(), serde_json::json!(type_id));
        }
        if let Some(from_id) = from_id {
            link.insert("from_id".to_string(), serde_json::json!(from_id));
        }
        if let Some(to_id) = to_id {
            link.insert("to_id".to_string(), serde_json::json!(to_id));
        }
        if let Some(props) = props {
            link.insert("props".to_string(), props);
        }

        let event = serde_json::json!({"op": "insert", "link": link});
        reply(self.client.send_event(event).await, format_event_response)
    }

    #[tool(description = "Update a link: set or clear references and attributes via a patch")]
    async fn mirel_update(
        &self,
        params: Parameters<UpdateParams>,
    ) -> Result<CallToolResult, McpError> {
        let UpdateParams { id, set } = params.0;
        let event = serde_json::json!({"op": "update", "id": id, "set": set});
        reply(self.client.send_event(event).await, format_event_response)
    }

    #[tool(description = "Delete a link by ID (references to it elsewhere become dangling)")]
    async fn mirel_delete(
        &self,
        params: Parameters<DeleteParams>,
    ) -> Result<CallToolResult, McpError> {
        let event = serde_json::json!({"op": "delete", "id": params.0.id});
        reply(self.client.send_event(event).await, format_event_response)
    }

    #[tool(description = "Export the mirror as a canonical snapshot (base64, with checksum)")]
    async fn mirel_export(&self) -> Result<CallToolResult, McpError> {
        reply(self.client.export().await, format_export_response)
    }
}

// =============================================================================
// HANDLER WIRING
// =============================================================================

#[tool_handler]
impl ServerHandler for MirelMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Mirel link graph mirror. Links are records that double as nodes \
                 and typed directed edges. Use tools to insert, update, and delete \
                 links, query them with recursive predicates, and export snapshots."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// =============================================================================
// TEXT RENDERING
// =============================================================================

/// Render the /status counters as a short block.
fn format_status(resp: &Value) -> String {
    let count = |field: &str| resp.get(field).and_then(|v| v.as_u64()).unwrap_or(0);
    format!(
        "Mirror Status:\n  Links: {}\n  Types in use: {}\n  References: {} ({} resolved, {} dangling)",
        count("link_count"),
        count("type_count"),
        count("reference_count"),
        count("resolved_references"),
        count("dangling_references"),
    )
}

/// Summarize an /export response without echoing the payload itself.
fn format_export_response(resp: &Value) -> String {
    let success = resp
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !success {
        let err = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return format!("Export failed: {err}");
    }

    let links = resp.get("link_count").and_then(|v| v.as_u64()).unwrap_or(0);
    let checksum = resp.get("checksum").and_then(|v| v.as_u64()).unwrap_or(0);
    let encoded = resp
        .get("data")
        .and_then(|v| v.as_str())
        .map(str::len)
        .unwrap_or(0);
    format!("Exported {links} links ({encoded} base64 chars), checksum {checksum:016x}")
}

/// One-line rendering of a link JSON object.
fn format_link(link: &Value) -> String {
    let id = link.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
    let mut line = format!("link {id}");
    if let Some(type_id) = link.get("type_id").and_then(|v| v.as_u64()) {
        line.push_str(&format!(" type={type_id}"));
    }
    if let Some(from_id) = link.get("from_id").and_then(|v| v.as_u64()) {
        line.push_str(&format!(" from={from_id}"));
    }
    if let Some(to_id) = link.get("to_id").and_then(|v| v.as_u64()) {
        line.push_str(&format!(" to={to_id}"));
    }
    if let Some(props) = link.get("props").and_then(|v| v.as_object())
        && !props.is_empty()
    {
        line.push_str(&format!(" props={}", Value::Object(props.clone())));
    }
    line
}

/// Format a query response JSON into human-readable text.
fn format_query_response(resp: &Value) -> String {
    let success = resp
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !success {
        let error = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return format!("Query failed: {error}");
    }

    let Some(links) = resp.get("links").and_then(|v| v.as_array()) else {
        return "Matched 0 links.".to_string();
    };
    if links.is_empty() {
        return "Matched 0 links.".to_string();
    }

    let mut parts = vec![format!("Matched {} links:", links.len())];
    for link in links {
        parts.push(format!("  {}", format_link(link)));
    }
    parts.join("\n")
}

/// Format a link detail response, including reference resolution state.
fn format_link_detail(resp: &Value) -> String {
    if let Some(error) = resp.get("error").and_then(|v| v.as_str()) {
        return format!("Not found: {error}");
    }
    let Some(link) = resp.get("link") else {
        return format!("Unexpected response: {resp}");
    };

    let mut parts = vec![format_link(link)];

    // A *_link sibling is present only when the target is stored.
    for (label, field, sibling) in [
        ("type", "type_id", "type_link"),
        ("from", "from_id", "from_link"),
        ("to", "to_id", "to_link"),
    ] {
        if let Some(target) = link.get(field).and_then(|v| v.as_u64()) {
            let state = if resp.get(sibling).is_some_and(|v| !v.is_null()) {
                "resolved"
            } else {
                "dangling"
            };
            parts.push(format!("  {label} -> {target} ({state})"));
        }
    }

    if let Some(typed) = resp.get("typed").and_then(|v| v.as_array())
        && !typed.is_empty()
    {
        parts.push(format!("  typed by: {}", format_id_list(typed)));
    }
    if let Some(out) = resp.get("out").and_then(|v| v.as_array())
        && !out.is_empty()
    {
        parts.push(format!("  outgoing edges: {}", format_id_list(out)));
    }
    if let Some(incoming) = resp.get("in").and_then(|v| v.as_array())
        && !incoming.is_empty()
    {
        parts.push(format!("  incoming edges: {}", format_id_list(incoming)));
    }

    parts.join("\n")
}

/// Format an events response (applied count or failure point).
fn format_event_response(resp: &Value) -> String {
    let success = resp
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let applied = resp.get("applied").and_then(|v| v.as_u64()).unwrap_or(0);
    if success {
        format!("Applied {applied} event(s).")
    } else {
        let error = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        format!("Event failed after {applied} applied: {error}")
    }
}

fn format_id_list(ids: &[Value]) -> String {
    let rendered: Vec<String> = ids
        .iter()
        .filter_map(|v| v.as_u64().map(|n| n.to_string()))
        .collect();
    format!("[{}]", rendered.join(", "))
}
