// MCP client mode: spawns configured external MCP servers as child
// processes and bridges their tools into the shared Tool Registry so
// the agent loop can call them exactly like a built-in tool.

use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::McpServerConfig;
use crate::tools::{ToolDefinition, ToolExecutionContext, ToolHandler, ToolRegistry, ToolRegistryError};

use super::types::{InitializeResult, JsonRpcRequest, JsonRpcResponse};

const CLIENT_PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "k13d";

#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("failed to spawn mcp server `{0}`: {1}")]
    Spawn(String, std::io::Error),

    #[error("mcp server `{0}` closed its stdout before responding")]
    ClosedStream(String),

    #[error("mcp server `{0}` sent an unparseable response: {1}")]
    Decode(String, serde_json::Error),

    #[error("mcp server `{0}` returned an error for `{1}`: {2}")]
    RemoteError(String, String, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One connected child-process MCP server: its framed stdio pipe plus
/// a monotonic request id counter for matching responses.
struct ServerConnection {
    name: String,
    _child: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    next_id: AtomicI64,
}

impl ServerConnection {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(json!(id)), method: method.to_string(), params };
        self.send(&request).await?;
        self.read_response(id).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpClientError> {
        let request = JsonRpcRequest { jsonrpc: "2.0".to_string(), id: None, method: method.to_string(), params };
        self.send(&request).await
    }

    async fn send(&self, request: &JsonRpcRequest) -> Result<(), McpClientError> {
        let serialized = serde_json::to_string(request).expect("JsonRpcRequest always serializes");
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(serialized.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&self, expected_id: i64) -> Result<Value, McpClientError> {
        let mut stdout = self.stdout.lock().await;
        loop {
            let mut line = String::new();
            let bytes_read = stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(McpClientError::ClosedStream(self.name.clone()));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response: JsonRpcResponse =
                serde_json::from_str(trimmed).map_err(|e| McpClientError::Decode(self.name.clone(), e))?;

            let matches_id = response.id.as_ref().and_then(Value::as_i64) == Some(expected_id);
            if !matches_id {
                continue;
            }

            if let Some(err) = response.error {
                return Err(McpClientError::RemoteError(self.name.clone(), format!("id {}", expected_id), err.message));
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }
}

/// Bridges one remote tool into the registry: every call round-trips a
/// `tools/call` request through the owning server's stdio pipe.
struct RemoteToolHandler {
    connection: Arc<ServerConnection>,
    remote_name: String,
}

#[async_trait]
impl ToolHandler for RemoteToolHandler {
    fn command_for_safety_check(&self, _arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("mcp {}.{}", self.connection.name, self.remote_name))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        let params = json!({ "name": self.remote_name, "arguments": arguments });
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ToolRegistryError::ExecutionFailed(format!("mcp call to {}.{} was cancelled", self.connection.name, self.remote_name)));
            }
            result = self.connection.request("tools/call", Some(params)) => {
                result.map_err(|e| ToolRegistryError::ExecutionFailed(e.to_string()))?
            }
        };

        let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
        let text = result
            .get("content")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        if is_error {
            Err(ToolRegistryError::ExecutionFailed(text))
        } else {
            Ok(text)
        }
    }
}

/// Spawns every enabled `mcp.servers[]` entry, performs the
/// `initialize`/`notifications/initialized` handshake, lists its tools,
/// and registers each one into `registry` under `"<server_name>.<tool_name>"`.
pub async fn connect_configured_servers(
    servers: &[McpServerConfig],
    registry: &mut ToolRegistry,
) -> Result<(), McpClientError> {
    for server in servers {
        if !server.enabled {
            continue;
        }
        connect_one(server, registry).await?;
    }
    Ok(())
}

async fn connect_one(server: &McpServerConfig, registry: &mut ToolRegistry) -> Result<(), McpClientError> {
    let mut command = tokio::process::Command::new(&server.command);
    command.args(&server.args).envs(&server.env).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(|e| McpClientError::Spawn(server.name.clone(), e))?;
    let stdin = child.stdin.take().expect("stdin piped");
    let stdout = child.stdout.take().expect("stdout piped");

    let connection = Arc::new(ServerConnection {
        name: server.name.clone(),
        _child: child,
        stdin: Mutex::new(stdin),
        stdout: Mutex::new(BufReader::new(stdout)),
        next_id: AtomicI64::new(1),
    });

    let init_params = json!({
        "protocolVersion": CLIENT_PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
    });
    let init_result = connection.request("initialize", Some(init_params)).await?;
    let _: InitializeResult =
        serde_json::from_value(init_result).map_err(|e| McpClientError::Decode(server.name.clone(), e))?;

    connection.notify("notifications/initialized", None).await?;

    let tools_result = connection.request("tools/list", None).await?;
    let tools = tools_result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();

    for tool in tools {
        let remote_name = match tool.get("name").and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => continue,
        };
        let description = tool.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
        let schema = tool.get("inputSchema").cloned().unwrap_or_else(|| json!({"type": "object"}));

        let qualified_name = format!("{}.{}", server.name, remote_name);
        let handler = RemoteToolHandler { connection: connection.clone(), remote_name: remote_name.clone() };

        let definition = ToolDefinition {
            name: qualified_name.clone(),
            description: format!("[{}] {}", server.name, description),
            parameters_schema: schema,
        };

        if let Err(e) = registry.register(definition, Box::new(handler)) {
            tracing::warn!(tool = %qualified_name, error = %e, "skipping duplicate mcp tool registration");
        }
    }

    Ok(())
}
