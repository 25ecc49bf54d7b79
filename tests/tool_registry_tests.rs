//! Tool Registry contract tests: every built-in tool this component
//! promises must be present with a schema that actually validates the
//! arguments an LLM provider would send it.

use serde_json::json;

use k13d::tools::{ToolCall, ToolExecutionContext, ToolRegistry};
use tokio_util::sync::CancellationToken;

#[test]
fn required_builtins_are_all_registered() {
    let registry = ToolRegistry::with_defaults().unwrap();
    for name in ["kubectl", "kubectl_get", "kubectl_describe", "kubectl_logs", "kubectl_apply", "bash"] {
        assert!(registry.get(name).is_some(), "missing required builtin `{name}`");
    }
}

#[test]
fn tool_list_order_is_stable_across_rebuilds() {
    let a = ToolRegistry::with_defaults().unwrap().names().into_iter().map(String::from).collect::<Vec<_>>();
    let b = ToolRegistry::with_defaults().unwrap().names().into_iter().map(String::from).collect::<Vec<_>>();
    assert_eq!(a, b);
}

#[test]
fn kubectl_get_rejects_arguments_missing_required_fields() {
    let registry = ToolRegistry::with_defaults().unwrap();
    let result = registry.validate_arguments("kubectl_get", &json!({}));
    assert!(result.is_err());
}

#[test]
fn kubectl_get_accepts_well_formed_arguments() {
    let registry = ToolRegistry::with_defaults().unwrap();
    let result = registry.validate_arguments("kubectl_get", &json!({"resource": "pods", "namespace": "default"}));
    assert!(result.is_ok());
}

#[test]
fn unknown_tool_name_is_rejected() {
    let registry = ToolRegistry::with_defaults().unwrap();
    assert!(registry.validate_arguments("does_not_exist", &json!({})).is_err());
}

#[tokio::test]
async fn dispatch_returns_an_error_result_for_an_unknown_tool() {
    let registry = ToolRegistry::with_defaults().unwrap();
    let ctx = ToolExecutionContext::default();
    let call = ToolCall { id: "call-1".to_string(), name: "does_not_exist".to_string(), arguments: json!({}) };

    let result = registry.dispatch(&call, &ctx, CancellationToken::new()).await;
    assert!(result.is_error);
    assert_eq!(result.call_id, "call-1");
}

#[tokio::test]
async fn dispatch_surfaces_schema_violations_as_an_error_result_instead_of_panicking() {
    let registry = ToolRegistry::with_defaults().unwrap();
    let ctx = ToolExecutionContext::default();
    let call = ToolCall { id: "call-2".to_string(), name: "kubectl_get".to_string(), arguments: json!({"wrong_field": true}) };

    let result = registry.dispatch(&call, &ctx, CancellationToken::new()).await;
    assert!(result.is_error);
}
