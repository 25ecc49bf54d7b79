//! End-to-end Agent Loop scenarios: a scripted provider stands in for a
//! real LLM backend, driving the loop through the same Tool Registry and
//! Safety Analyzer a real turn would use, verifying the pieces compose
//! the way each does in isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

use k13d::agent::{AgentEvent, AgentLoop, AgentPhase};
use k13d::approval::{ApprovalDecision, ApprovalError, ApprovalRequest, AutoDecider, InProcessApprovalChannel};
use k13d::llm::{Provider, ProviderError, ProviderResponse};
use k13d::safety::SafetyPolicy;
use k13d::session::{Message, SessionStore};
use k13d::tools::{ToolCall, ToolDefinition, ToolExecutionContext, ToolRegistry};
use tokio_util::sync::CancellationToken;

/// Replays a fixed sequence of responses, one per `chat` call, ignoring
/// the transcript it's handed - a stand-in for any real `Provider`.
struct ScriptedProvider {
    responses: Vec<ProviderResponse>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self { responses, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn endpoint(&self) -> &str {
        "scripted://local"
    }

    async fn chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _stream_sink: Option<UnboundedSender<String>>,
        _cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.get(i).cloned().ok_or(ProviderError::EmptyResponse("scripted"))
    }
}

fn registry_with(name: &str, params_schema: serde_json::Value) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinition { name: name.to_string(), description: "test tool".to_string(), parameters_schema: params_schema },
            Box::new(EchoHandler),
        )
        .unwrap();
    Arc::new(registry)
}

struct EchoHandler;

#[async_trait]
impl k13d::tools::ToolHandler for EchoHandler {
    fn command_for_safety_check(&self, arguments: &serde_json::Value) -> Result<String, k13d::tools::ToolRegistryError> {
        Ok(format!("kubectl get {}", arguments.get("resource").and_then(|v| v.as_str()).unwrap_or("pods")))
    }

    async fn call(&self, arguments: serde_json::Value, _ctx: &ToolExecutionContext, _cancel: CancellationToken) -> Result<String, k13d::tools::ToolRegistryError> {
        Ok(format!("ok: {arguments}"))
    }
}

#[tokio::test]
async fn a_plain_text_reply_finishes_the_turn_without_any_tool_calls() {
    let provider = Arc::new(ScriptedProvider::new(vec![ProviderResponse {
        content: "the cluster looks healthy".to_string(),
        tool_calls: Vec::new(),
    }]));
    let registry = registry_with("get_pods", json!({"type": "object", "properties": {}}));
    let loop_ = AgentLoop {
        provider,
        registry,
        approval: Arc::new(AutoDecider::default()),
        safety_policy: SafetyPolicy::default(),
        tool_context: ToolExecutionContext::default(),
        max_turns: None,
    };

    let store = SessionStore::new();
    let session = store.get_or_create("s1");
    let result = loop_.run_turn(&session, "how's the cluster?".to_string(), None).await.unwrap();

    assert_eq!(result, "the cluster looks healthy");
    assert_eq!(session.messages().await.len(), 2); // user + assistant
}

#[tokio::test]
async fn a_read_only_tool_call_runs_without_requiring_approval() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ProviderResponse {
            content: String::new(),
            tool_calls: vec![ToolCall { id: "call-1".to_string(), name: "get_pods".to_string(), arguments: json!({"resource": "pods"}) }],
        },
        ProviderResponse { content: "pods are all running".to_string(), tool_calls: Vec::new() },
    ]));
    let registry = registry_with("get_pods", json!({"type": "object", "properties": {"resource": {"type": "string"}}}));

    // AutoDecider denies anything that isn't read-only, so if this turn
    // succeeds it proves the loop never asked for approval at all.
    let loop_ = AgentLoop {
        provider,
        registry,
        approval: Arc::new(AutoDecider { auto_approve_read_only: false }),
        safety_policy: SafetyPolicy::default(),
        tool_context: ToolExecutionContext::default(),
        max_turns: None,
    };

    let store = SessionStore::new();
    let session = store.get_or_create("s1");
    let result = loop_.run_turn(&session, "list the pods".to_string(), None).await.unwrap();

    assert_eq!(result, "pods are all running");
    let executions = session.tool_executions().await;
    assert_eq!(executions.len(), 1);
    assert!(!executions[0].result.as_ref().unwrap().is_error);
}

#[tokio::test]
async fn a_dangerous_tool_call_goes_through_the_approval_channel_and_can_be_approved() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ProviderResponse {
            content: String::new(),
            tool_calls: vec![ToolCall { id: "call-1".to_string(), name: "delete_thing".to_string(), arguments: json!({}) }],
        },
        ProviderResponse { content: "deleted".to_string(), tool_calls: Vec::new() },
    ]));

    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinition { name: "delete_thing".to_string(), description: "test".to_string(), parameters_schema: json!({"type": "object", "properties": {}}) },
            Box::new(DeleteHandler),
        )
        .unwrap();
    let registry = Arc::new(registry);

    let approval = Arc::new(InProcessApprovalChannel::new(std::time::Duration::from_secs(5)));
    let loop_ = AgentLoop {
        provider,
        registry,
        approval: approval.clone(),
        safety_policy: SafetyPolicy::default(),
        tool_context: ToolExecutionContext::default(),
        max_turns: None,
    };

    let store = SessionStore::new();
    let session = store.get_or_create("s1");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<AgentEvent>();
    let turn = tokio::spawn(async move { loop_.run_turn(&session, "delete it".to_string(), Some(tx)).await });

    // wait for the approval request to arrive, then approve it
    loop {
        match rx.recv().await {
            Some(AgentEvent::PhaseChanged(AgentPhase::WaitingForApproval)) => {
                approval.submit_decision("call-1", ApprovalDecision::Approved).unwrap();
                break;
            }
            Some(_) => continue,
            None => panic!("event stream closed before an approval request was seen"),
        }
    }

    let result = turn.await.unwrap().unwrap();
    assert_eq!(result, "deleted");
}

struct DeleteHandler;

#[async_trait]
impl k13d::tools::ToolHandler for DeleteHandler {
    fn command_for_safety_check(&self, _arguments: &serde_json::Value) -> Result<String, k13d::tools::ToolRegistryError> {
        Ok("kubectl delete pod victim".to_string())
    }

    async fn call(&self, _arguments: serde_json::Value, _ctx: &ToolExecutionContext, _cancel: CancellationToken) -> Result<String, k13d::tools::ToolRegistryError> {
        Ok("pod victim deleted".to_string())
    }
}

#[tokio::test]
async fn block_dangerous_policy_denies_without_ever_asking_for_approval() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ProviderResponse {
            content: String::new(),
            tool_calls: vec![ToolCall { id: "call-1".to_string(), name: "delete_thing".to_string(), arguments: json!({}) }],
        },
        ProviderResponse { content: "done".to_string(), tool_calls: Vec::new() },
    ]));

    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinition { name: "delete_thing".to_string(), description: "test".to_string(), parameters_schema: json!({"type": "object", "properties": {}}) },
            Box::new(DeleteHandler),
        )
        .unwrap();

    let mut policy = SafetyPolicy::default();
    policy.block_dangerous = true;

    // An approval channel that always errors: if the loop consulted it,
    // the turn would fail instead of completing with a denial recorded.
    struct NeverAsk;
    #[async_trait]
    impl k13d::approval::ApprovalChannel for NeverAsk {
        async fn request_approval(&self, _request: ApprovalRequest) -> Result<ApprovalDecision, ApprovalError> {
            panic!("approval channel should not be consulted when block_dangerous is set")
        }
    }

    let loop_ = AgentLoop {
        provider,
        registry: Arc::new(registry),
        approval: Arc::new(NeverAsk),
        safety_policy: policy,
        tool_context: ToolExecutionContext::default(),
        max_turns: None,
    };

    let store = SessionStore::new();
    let session = store.get_or_create("s1");
    let result = loop_.run_turn(&session, "delete it".to_string(), None).await.unwrap();

    assert_eq!(result, "done");
    let executions = session.tool_executions().await;
    assert!(matches!(executions[0].approval, k13d::session::ApprovalRecord::Denied { .. }));
}
