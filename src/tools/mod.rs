//! Tool Registry: a name -> handler map the agent loop dispatches
//! provider-emitted tool calls against.
//!
//! Every entry is described by a JSON Schema so a [`crate::llm::Provider`]
//! can advertise it to the model without the registry knowing anything
//! about which provider is asking. Insertion order is preserved
//! (`indexmap`) so the tool list presented to a model is stable across
//! a process's lifetime, which matters for providers that cache a
//! tool-list hash.

pub mod builtins;

use async_trait::async_trait;
use indexmap::IndexMap;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A tool call as emitted by an LLM provider: an opaque id the provider
/// assigned (echoed back in the tool result message) plus a name and
/// raw JSON arguments the provider believes matches the tool's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The result of running a tool call, fed back to the provider as a
/// tool-result message keyed by `call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), output: output.into(), is_error: false }
    }

    pub fn error(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), output: output.into(), is_error: true }
    }

    pub fn cancelled(call_id: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), output: "tool call was cancelled".to_string(), is_error: true }
    }
}

/// Execution context threaded through every handler: the cluster/shell
/// environment a tool call runs against, and the raw command text the
/// safety analyzer should classify before the handler is allowed to run.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    pub working_directory: std::path::PathBuf,
    pub kubectl_context: Option<crate::kubectl::KubectlContext>,
}

/// A registry entry's implementation. `command_for_safety_check` lets the
/// dispatch loop run the Safety Analyzer against the literal command a
/// handler is about to execute *before* `call` runs it, without the
/// handler having to duplicate that classification itself.
///
/// `call` takes a [`CancellationToken`] so a handler that shells out
/// (`kubectl logs -f`, a slow `bash` pipeline) can tear down its
/// subprocess cooperatively instead of leaking it when a turn is
/// cancelled mid-execution.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError>;

    async fn call(&self, arguments: Value, ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

struct RegisteredTool {
    definition: ToolDefinition,
    compiled_schema: JSONSchema,
    handler: Box<dyn ToolHandler>,
}

/// Name -> handler map, insertion-ordered, schema-validating.
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: IndexMap::new() }
    }

    /// Builds the registry with every required built-in tool registered.
    pub fn with_defaults() -> Result<Self, ToolRegistryError> {
        let mut registry = Self::new();
        builtins::register_all(&mut registry)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Box<dyn ToolHandler>,
    ) -> Result<(), ToolRegistryError> {
        let compiled_schema = JSONSchema::compile(&definition.parameters_schema)
            .map_err(|e| ToolRegistryError::InvalidSchema(definition.name.clone(), e.to_string()))?;

        if self.tools.contains_key(&definition.name) {
            return Err(ToolRegistryError::DuplicateTool(definition.name.clone()));
        }

        self.tools.insert(
            definition.name.clone(),
            RegisteredTool { definition, compiled_schema, handler },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Definitions in registration order, for handing to a provider as
    /// its tool-use advertisement.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn validate_arguments(&self, name: &str, arguments: &Value) -> Result<(), ToolRegistryError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolRegistryError::UnknownTool(name.to_string()))?;
        tool.compiled_schema
            .validate(arguments)
            .map_err(|errors| {
                let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
                ToolRegistryError::SchemaViolation(name.to_string(), messages.join("; "))
            })
    }

    pub fn command_for_safety_check(&self, name: &str, arguments: &Value) -> Result<String, ToolRegistryError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolRegistryError::UnknownTool(name.to_string()))?;
        tool.handler.command_for_safety_check(arguments)
    }

    /// Dispatches a provider-emitted tool call: validates its arguments
    /// against the registered schema, then runs the handler. Does NOT
    /// perform safety classification or approval gating - that's the
    /// agent loop's job, using [`Self::command_for_safety_check`] first.
    ///
    /// If `cancel` is already tripped when the call would otherwise
    /// run, the handler is never invoked and a cancelled result is
    /// returned instead.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ToolExecutionContext, cancel: CancellationToken) -> ToolResult {
        let tool = match self.tools.get(&call.name) {
            Some(t) => t,
            None => return ToolResult::error(&call.id, format!("unknown tool `{}`", call.name)),
        };

        if let Err(e) = self.validate_arguments(&call.name, &call.arguments) {
            return ToolResult::error(&call.id, e.to_string());
        }

        if cancel.is_cancelled() {
            return ToolResult::cancelled(&call.id);
        }

        match tool.handler.call(call.arguments.clone(), ctx, cancel).await {
            Ok(output) => ToolResult::ok(&call.id, output),
            Err(e) => ToolResult::error(&call.id, e.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ToolRegistryError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("tool `{0}` not found in registry")]
    UnknownTool(String),

    #[error("invalid JSON schema for tool `{0}`: {1}")]
    InvalidSchema(String, String),

    #[error("arguments for tool `{0}` do not match its schema: {1}")]
    SchemaViolation(String, String),

    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
            Ok(arguments.get("text").and_then(Value::as_str).unwrap_or("").to_string())
        }

        async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, _cancel: CancellationToken) -> Result<String, ToolRegistryError> {
            Ok(arguments.get("text").and_then(Value::as_str).unwrap_or("").to_string())
        }
    }

    fn echo_definition() -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "echoes text back".to_string(),
            parameters_schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            }),
        }
    }

    #[test]
    fn register_and_list_preserves_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_definition(), Box::new(EchoHandler)).unwrap();
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn duplicate_registration_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_definition(), Box::new(EchoHandler)).unwrap();
        let err = registry.register(echo_definition(), Box::new(EchoHandler));
        assert!(matches!(err, Err(ToolRegistryError::DuplicateTool(_))));
    }

    #[tokio::test]
    async fn dispatch_validates_schema_before_calling_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_definition(), Box::new(EchoHandler)).unwrap();

        let ctx = ToolExecutionContext::default();
        let bad_call = ToolCall { id: "1".into(), name: "echo".into(), arguments: json!({}) };
        let result = registry.dispatch(&bad_call, &ctx, CancellationToken::new()).await;
        assert!(result.is_error);

        let good_call = ToolCall { id: "2".into(), name: "echo".into(), arguments: json!({"text": "hi"}) };
        let result = registry.dispatch(&good_call, &ctx, CancellationToken::new()).await;
        assert!(!result.is_error);
        assert_eq!(result.output, "hi");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let ctx = ToolExecutionContext::default();
        let call = ToolCall { id: "1".into(), name: "missing".into(), arguments: json!({}) };
        let result = registry.dispatch(&call, &ctx, CancellationToken::new()).await;
        assert!(result.is_error);
    }
}
