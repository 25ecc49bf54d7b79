// MCP server mode: exposes the Tool Registry over stdio JSON-RPC 2.0 so
// an external MCP client (an editor, another agent) can list and call
// k13d's tools directly, bypassing the agent loop and LLM provider
// entirely.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::tools::{ToolCall, ToolExecutionContext, ToolRegistry};

use super::types::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerCapabilities,
    ServerInfo, ToolCallParams, ToolCallResult, ToolsCapability, ToolsListResult,
};

const PROTOCOL_VERSION: &str = "2024-11-05";
const INITIAL_LINE_BUFFER: usize = 1024 * 1024;
const MAX_LINE_BUFFER: usize = 10 * 1024 * 1024;

/// Drives the stdio JSON-RPC loop: one line in, one response line out,
/// dispatching `tools/call` against the shared [`ToolRegistry`].
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    tool_context: ToolExecutionContext,
    stdout: Mutex<tokio::io::Stdout>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, tool_context: ToolExecutionContext) -> Self {
        Self { registry, tool_context, stdout: Mutex::new(tokio::io::stdout()) }
    }

    /// Reads JSON-RPC requests from stdin, one per line, until EOF.
    /// Lines longer than the current buffer grow it (doubling) up to
    /// `MAX_LINE_BUFFER` rather than truncating a legitimate large
    /// `tools/call` payload.
    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::with_capacity(INITIAL_LINE_BUFFER, stdin);
        let mut line = String::new();
        let mut capacity = INITIAL_LINE_BUFFER;

        tracing::info!("mcp server started, waiting for requests on stdin");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if trimmed.len() > capacity && capacity < MAX_LINE_BUFFER {
                capacity = (trimmed.len() * 2).min(MAX_LINE_BUFFER);
                reader = BufReader::with_capacity(capacity, reader.into_inner());
            }

            match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => {
                    if let Some(response) = self.handle_request(request).await {
                        self.write_response(&response).await?;
                    }
                }
                Err(e) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error(&e.to_string()));
                    self.write_response(&response).await?;
                }
            }
        }

        Ok(())
    }

    async fn write_response(&self, response: &JsonRpcResponse) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(response)?;
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }

    /// Returns `None` for notifications, which have no response by
    /// JSON-RPC convention.
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.id.is_none() && request.method == "notifications/initialized" {
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e),
        })
    }

    fn handle_initialize(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities { tools: Some(ToolsCapability { list_changed: false }) },
            server_info: ServerInfo { name: "k13d-mcp".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = self
            .registry
            .definitions()
            .into_iter()
            .map(|d| super::types::ToolDefinition {
                name: d.name,
                description: d.description,
                input_schema: d.parameters_schema,
            })
            .collect();
        let result = ToolsListResult { tools };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let params: ToolCallParams = match params {
            Some(v) => serde_json::from_value(v).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing params")),
        };

        if self.registry.get(&params.name).is_none() {
            return Err(JsonRpcError::invalid_params(&format!("unknown tool `{}`", params.name)));
        }

        let call = ToolCall { id: uuid::Uuid::new_v4().to_string(), name: params.name, arguments: params.arguments };
        // MCP stdio requests are synchronous request/response with no
        // transport-level cancellation signal, so each call gets its own
        // token that is never tripped.
        let outcome = self.registry.dispatch(&call, &self.tool_context, CancellationToken::new()).await;

        let result =
            if outcome.is_error { ToolCallResult::error(outcome.output) } else { ToolCallResult::success(outcome.output) };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::tools::{ToolDefinition, ToolHandler, ToolRegistryError};

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn command_for_safety_check(&self, arguments: &serde_json::Value) -> Result<String, ToolRegistryError> {
            Ok(arguments.get("text").and_then(serde_json::Value::as_str).unwrap_or("").to_string())
        }

        async fn call(&self, arguments: serde_json::Value, _ctx: &ToolExecutionContext, _cancel: CancellationToken) -> Result<String, ToolRegistryError> {
            Ok(arguments.get("text").and_then(serde_json::Value::as_str).unwrap_or("").to_string())
        }
    }

    fn server_with_echo() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinition {
                    name: "echo".to_string(),
                    description: "echoes text".to_string(),
                    parameters_schema: json!({
                        "type": "object",
                        "properties": { "text": { "type": "string" } },
                        "required": ["text"],
                    }),
                },
                Box::new(EchoHandler),
            )
            .unwrap();
        McpServer::new(Arc::new(registry), ToolExecutionContext::default())
    }

    #[tokio::test]
    async fn initialize_reports_server_name_and_protocol_version() {
        let server = server_with_echo();
        let result = server.handle_initialize().unwrap();
        assert_eq!(result["serverInfo"]["name"], "k13d-mcp");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_reports_registered_tool() {
        let server = server_with_echo();
        let result = server.handle_tools_list().unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
    }

    #[tokio::test]
    async fn notifications_initialized_yields_no_response() {
        let server = server_with_echo();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server.handle_request(request).await.is_none());
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let server = server_with_echo();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "bogus".to_string(),
            params: None,
        };
        let response = server.handle_request(request).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn tools_call_dispatches_to_registered_handler() {
        let server = server_with_echo();
        let result = server
            .handle_tools_call(Some(json!({"name": "echo", "arguments": {"text": "hi"}})))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], "hi");
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_invalid_params() {
        let server = server_with_echo();
        let err = server.handle_tools_call(Some(json!({"name": "missing", "arguments": {}}))).await.unwrap_err();
        assert_eq!(err.code, -32602);
    }
}
