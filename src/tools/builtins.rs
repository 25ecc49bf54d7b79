//! The built-in tool handlers every installation carries regardless of
//! which LLM provider or MCP servers are configured: `kubectl` itself
//! plus four read/write shortcuts a model reaches for constantly enough
//! to deserve their own narrower schemas, and a `bash` escape hatch for
//! everything kubectl doesn't cover.
//!
//! Command construction follows `src/kubectl/executor.rs`'s shelling-out
//! pattern (spawn the real binary, capture stdout/stderr, truncate for
//! logging) but against `tokio::process::Command` since handlers are
//! async and the agent loop must not block its worker thread on a
//! `kubectl logs -f` that runs for minutes.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{ToolDefinition, ToolExecutionContext, ToolHandler, ToolRegistry, ToolRegistryError};

const MAX_OUTPUT_BYTES: usize = 10 * 1024;

pub fn register_all(registry: &mut ToolRegistry) -> Result<(), ToolRegistryError> {
    registry.register(kubectl_definition(), Box::new(KubectlHandler))?;
    registry.register(kubectl_get_definition(), Box::new(KubectlGetHandler))?;
    registry.register(kubectl_describe_definition(), Box::new(KubectlDescribeHandler))?;
    registry.register(kubectl_logs_definition(), Box::new(KubectlLogsHandler))?;
    registry.register(kubectl_apply_definition(), Box::new(KubectlApplyHandler))?;
    registry.register(bash_definition(), Box::new(BashHandler))?;
    Ok(())
}

fn truncate(mut s: String) -> String {
    if s.len() > MAX_OUTPUT_BYTES {
        s.truncate(MAX_OUTPUT_BYTES);
        s.push_str("\n... (truncated)");
    }
    s
}

async fn run(program: &str, args: &[String], cancel: CancellationToken) -> Result<String, ToolRegistryError> {
    let mut child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolRegistryError::ExecutionFailed(format!("failed to spawn `{}`: {}", program, e)))?;

    let output = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(ToolRegistryError::ExecutionFailed(format!("`{}` was cancelled", program)));
        }
        result = child.wait_with_output() => {
            result.map_err(|e| ToolRegistryError::ExecutionFailed(format!("failed to run `{}`: {}", program, e)))?
        }
    };

    let stdout = truncate(String::from_utf8_lossy(&output.stdout).into_owned());
    let stderr = truncate(String::from_utf8_lossy(&output.stderr).into_owned());

    if output.status.success() {
        Ok(stdout)
    } else {
        Ok(format!(
            "exit status: {}\nstdout:\n{}\nstderr:\n{}",
            output.status.code().map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
            stdout,
            stderr
        ))
    }
}

fn quote_join(args: &[String]) -> String {
    args.iter()
        .map(|a| if a.contains(' ') { format!("{:?}", a) } else { a.clone() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn args_array(arguments: &Value) -> Result<Vec<String>, ToolRegistryError> {
    arguments
        .get("args")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolRegistryError::MissingArgument("args".to_string()))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolRegistryError::MissingArgument("args[] must be strings".to_string()))
        })
        .collect()
}

fn string_arg(arguments: &Value, key: &str) -> Result<String, ToolRegistryError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolRegistryError::MissingArgument(key.to_string()))
}

fn opt_string_arg(arguments: &Value, key: &str) -> Option<String> {
    arguments.get(key).and_then(Value::as_str).map(str::to_string)
}

struct KubectlHandler;

fn kubectl_definition() -> ToolDefinition {
    ToolDefinition {
        name: "kubectl".to_string(),
        description: "Runs an arbitrary kubectl subcommand. Prefer the narrower kubectl_get/describe/logs/apply tools when they fit.".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Arguments passed to kubectl, not including the `kubectl` program name itself.",
                },
            },
            "required": ["args"],
        }),
    }
}

#[async_trait]
impl ToolHandler for KubectlHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("kubectl {}", quote_join(&args_array(arguments)?)))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        run("kubectl", &args_array(&arguments)?, cancel).await
    }
}

struct KubectlGetHandler;

fn kubectl_get_definition() -> ToolDefinition {
    ToolDefinition {
        name: "kubectl_get".to_string(),
        description: "Lists resources of a given kind, optionally in a namespace or with a name.".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "resource": { "type": "string", "description": "Resource kind, e.g. pods, deployments, services." },
                "name": { "type": "string" },
                "namespace": { "type": "string" },
                "output": { "type": "string", "description": "Output format, e.g. json, yaml, wide." },
                "all_namespaces": { "type": "boolean" },
            },
            "required": ["resource"],
        }),
    }
}

fn kubectl_get_argv(arguments: &Value) -> Result<Vec<String>, ToolRegistryError> {
    let resource = string_arg(arguments, "resource")?;
    let mut argv = vec!["get".to_string(), resource];
    if let Some(name) = opt_string_arg(arguments, "name") {
        argv.push(name);
    }
    if let Some(ns) = opt_string_arg(arguments, "namespace") {
        argv.push("-n".to_string());
        argv.push(ns);
    }
    if arguments.get("all_namespaces").and_then(Value::as_bool).unwrap_or(false) {
        argv.push("-A".to_string());
    }
    if let Some(output) = opt_string_arg(arguments, "output") {
        argv.push("-o".to_string());
        argv.push(output);
    }
    Ok(argv)
}

#[async_trait]
impl ToolHandler for KubectlGetHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("kubectl {}", quote_join(&kubectl_get_argv(arguments)?)))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        run("kubectl", &kubectl_get_argv(&arguments)?, cancel).await
    }
}

struct KubectlDescribeHandler;

fn kubectl_describe_definition() -> ToolDefinition {
    ToolDefinition {
        name: "kubectl_describe".to_string(),
        description: "Describes one resource in detail, including recent events.".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "resource": { "type": "string" },
                "name": { "type": "string" },
                "namespace": { "type": "string" },
            },
            "required": ["resource", "name"],
        }),
    }
}

fn kubectl_describe_argv(arguments: &Value) -> Result<Vec<String>, ToolRegistryError> {
    let resource = string_arg(arguments, "resource")?;
    let name = string_arg(arguments, "name")?;
    let mut argv = vec!["describe".to_string(), resource, name];
    if let Some(ns) = opt_string_arg(arguments, "namespace") {
        argv.push("-n".to_string());
        argv.push(ns);
    }
    Ok(argv)
}

#[async_trait]
impl ToolHandler for KubectlDescribeHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("kubectl {}", quote_join(&kubectl_describe_argv(arguments)?)))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        run("kubectl", &kubectl_describe_argv(&arguments)?, cancel).await
    }
}

struct KubectlLogsHandler;

fn kubectl_logs_definition() -> ToolDefinition {
    ToolDefinition {
        name: "kubectl_logs".to_string(),
        description: "Fetches logs for a pod (or a container within one). Does not follow by default.".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "pod": { "type": "string" },
                "container": { "type": "string" },
                "namespace": { "type": "string" },
                "tail_lines": { "type": "integer" },
                "previous": { "type": "boolean" },
            },
            "required": ["pod"],
        }),
    }
}

fn kubectl_logs_argv(arguments: &Value) -> Result<Vec<String>, ToolRegistryError> {
    let pod = string_arg(arguments, "pod")?;
    let mut argv = vec!["logs".to_string(), pod];
    if let Some(container) = opt_string_arg(arguments, "container") {
        argv.push("-c".to_string());
        argv.push(container);
    }
    if let Some(ns) = opt_string_arg(arguments, "namespace") {
        argv.push("-n".to_string());
        argv.push(ns);
    }
    if let Some(n) = arguments.get("tail_lines").and_then(Value::as_i64) {
        argv.push("--tail".to_string());
        argv.push(n.to_string());
    }
    if arguments.get("previous").and_then(Value::as_bool).unwrap_or(false) {
        argv.push("-p".to_string());
    }
    Ok(argv)
}

#[async_trait]
impl ToolHandler for KubectlLogsHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("kubectl {}", quote_join(&kubectl_logs_argv(arguments)?)))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        run("kubectl", &kubectl_logs_argv(&arguments)?, cancel).await
    }
}

struct KubectlApplyHandler;

fn kubectl_apply_definition() -> ToolDefinition {
    ToolDefinition {
        name: "kubectl_apply".to_string(),
        description: "Applies a manifest file path to the cluster. Always a Write-class action requiring approval.".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "file": { "type": "string", "description": "Path to the manifest file, or `-` to read from stdin." },
                "namespace": { "type": "string" },
                "dry_run": { "type": "string", "description": "client, server, or none." },
            },
            "required": ["file"],
        }),
    }
}

fn kubectl_apply_argv(arguments: &Value) -> Result<Vec<String>, ToolRegistryError> {
    let file = string_arg(arguments, "file")?;
    let mut argv = vec!["apply".to_string(), "-f".to_string(), file];
    if let Some(ns) = opt_string_arg(arguments, "namespace") {
        argv.push("-n".to_string());
        argv.push(ns);
    }
    if let Some(dry_run) = opt_string_arg(arguments, "dry_run") {
        argv.push(format!("--dry-run={}", dry_run));
    }
    Ok(argv)
}

#[async_trait]
impl ToolHandler for KubectlApplyHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        Ok(format!("kubectl {}", quote_join(&kubectl_apply_argv(arguments)?)))
    }

    async fn call(&self, arguments: Value, _ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        run("kubectl", &kubectl_apply_argv(&arguments)?, cancel).await
    }
}

struct BashHandler;

fn bash_definition() -> ToolDefinition {
    ToolDefinition {
        name: "bash".to_string(),
        description: "Runs a shell command outside of kubectl, for anything the kubectl tools don't cover (grep/jq on prior output, curl against a forwarded port, etc).".to_string(),
        parameters_schema: json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
            },
            "required": ["command"],
        }),
    }
}

#[async_trait]
impl ToolHandler for BashHandler {
    fn command_for_safety_check(&self, arguments: &Value) -> Result<String, ToolRegistryError> {
        string_arg(arguments, "command")
    }

    async fn call(&self, arguments: Value, ctx: &ToolExecutionContext, cancel: CancellationToken) -> Result<String, ToolRegistryError> {
        let command = string_arg(&arguments, "command")?;
        let mut child = Command::new("bash")
            .arg("-c")
            .arg(&command)
            .current_dir(&ctx.working_directory)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolRegistryError::ExecutionFailed(format!("failed to spawn bash: {}", e)))?;

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(ToolRegistryError::ExecutionFailed("bash was cancelled".to_string()));
            }
            result = child.wait_with_output() => {
                result.map_err(|e| ToolRegistryError::ExecutionFailed(format!("failed to run bash: {}", e)))?
            }
        };

        let stdout = truncate(String::from_utf8_lossy(&output.stdout).into_owned());
        let stderr = truncate(String::from_utf8_lossy(&output.stderr).into_owned());
        if output.status.success() {
            Ok(stdout)
        } else {
            Ok(format!("exit status: {:?}\nstdout:\n{}\nstderr:\n{}", output.status.code(), stdout, stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubectl_get_builds_expected_argv() {
        let args = json!({"resource": "pods", "namespace": "default", "all_namespaces": false});
        let argv = kubectl_get_argv(&args).unwrap();
        assert_eq!(argv, vec!["get", "pods", "-n", "default"]);
    }

    #[test]
    fn kubectl_apply_includes_dry_run_flag() {
        let args = json!({"file": "deploy.yaml", "dry_run": "client"});
        let argv = kubectl_apply_argv(&args).unwrap();
        assert_eq!(argv, vec!["apply", "-f", "deploy.yaml", "--dry-run=client"]);
    }

    #[test]
    fn missing_required_argument_errors() {
        let args = json!({});
        assert!(matches!(kubectl_get_argv(&args), Err(ToolRegistryError::MissingArgument(_))));
    }

    #[test]
    fn register_all_populates_six_builtins() {
        let mut registry = ToolRegistry::new();
        register_all(&mut registry).unwrap();
        assert_eq!(registry.len(), 6);
        assert!(registry.get("kubectl").is_some());
        assert!(registry.get("bash").is_some());
    }
}
