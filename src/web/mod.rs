//! Web dashboard: an HTTP/SSE surface over the same [`crate::agent::AgentLoop`]
//! the TUI drives, for a browser client instead of a terminal one.
//!
//! Grounded on the agent loop's existing event-sink seam
//! (`AgentLoop::run_turn`'s `Option<UnboundedSender<AgentEvent>>`) and
//! the Approval Channel's transport-agnostic design
//! (`src/approval/mod.rs`'s doc comment calls out the web dashboard's
//! POST-driven decision explicitly) - this module is the "other caller"
//! those seams were built for. Non-goal per the distilled spec: widget
//! layout and report file formats, so the dashboard exposes JSON/SSE
//! contracts only, no bundled frontend.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{AgentEvent, AgentLoop};
use crate::approval::{ApprovalDecision, InProcessApprovalChannel};
use crate::config::Config;
use crate::session::SessionStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct DashboardState {
    agent_loop: Arc<AgentLoop>,
    sessions: Arc<SessionStore>,
    approval: Arc<InProcessApprovalChannel>,
    event_channels: Mutex<HashMap<String, broadcast::Sender<AgentEvent>>>,
}

impl DashboardState {
    fn event_sender(&self, session_id: &str) -> broadcast::Sender<AgentEvent> {
        let mut channels = self.event_channels.lock();
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[derive(Deserialize)]
struct SubmitTurnRequest {
    prompt: String,
}

#[derive(Serialize)]
struct SubmitTurnResponse {
    session_id: String,
    accepted: bool,
}

#[derive(Deserialize)]
struct ApprovalDecisionRequest {
    approved: bool,
}

/// Builds the router and the agentic wiring it dispatches against, then
/// serves it on `bind` until the process is killed.
///
/// The provider, tool registry, and safety policy are built the same
/// way the TUI builds them (see `src/bin/k13d.rs`); the dashboard just
/// swaps the Approval Channel's UI from a terminal modal to whatever
/// the browser client POSTs.
pub async fn serve(config: Config, bind: &str) -> anyhow::Result<()> {
    let state = Arc::new(build_state(&config).await?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "web dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<DashboardState> {
    // Reuses the same provider/registry/safety construction as the TUI;
    // kept free-standing here (rather than imported from the bin crate)
    // since a bin target cannot be depended on by the library crate.
    use crate::llm::anthropic::AnthropicProvider;
    use crate::llm::embedded::EmbeddedProvider;
    use crate::llm::gemini::GeminiProvider;
    use crate::llm::ollama::OllamaProvider;
    use crate::llm::openai::OpenAiCompatibleProvider;
    use crate::llm::{AnyProvider, Provider, RetryingProvider};
    use crate::config::LlmProviderKind;

    let llm = &config.llm;
    let endpoint = if llm.provider == LlmProviderKind::Azure && llm.endpoint.is_empty() && !llm.region.is_empty() {
        format!("https://{}.api.cognitive.microsoft.com", llm.region)
    } else {
        llm.resolved_endpoint()
    };
    let base = match llm.provider {
        LlmProviderKind::Openai | LlmProviderKind::Upstage | LlmProviderKind::Azure => {
            let provider = OpenAiCompatibleProvider::new(endpoint, llm.api_key.clone(), llm.model.clone())
                .with_azure_deployment(if llm.provider == LlmProviderKind::Azure { llm.azure_deployment.clone() } else { String::new() })
                .with_skip_tls_verify(llm.skip_tls_verify);
            AnyProvider::OpenAiCompatible(provider)
        }
        LlmProviderKind::Anthropic => AnyProvider::Anthropic(AnthropicProvider::new(llm.api_key.clone(), llm.model.clone())),
        LlmProviderKind::Gemini => AnyProvider::Gemini(GeminiProvider::new(llm.api_key.clone(), llm.model.clone())),
        LlmProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(endpoint, llm.model.clone())),
        LlmProviderKind::Embedded => AnyProvider::Embedded(EmbeddedProvider::new(config.embedded_llm.port, llm.model.clone())),
    };
    let provider: Arc<dyn Provider> = if llm.retry.enabled {
        Arc::new(
            RetryingProvider::with_policy(base, llm.retry.max_attempts, std::time::Duration::from_millis(250))
                .with_max_backoff(std::time::Duration::from_secs(llm.retry.max_backoff_secs)),
        )
    } else {
        Arc::new(base)
    };

    let mut registry = crate::tools::ToolRegistry::with_defaults()?;
    if let Err(e) = crate::mcp::connect_configured_servers(&config.mcp.servers, &mut registry).await {
        tracing::warn!(error = %e, "failed to connect one or more configured mcp servers");
    }

    let mut safety_policy = crate::safety::SafetyPolicy::with_blocked_patterns(&config.safety.blocked_patterns)?;
    safety_policy.block_dangerous = config.safety.block_dangerous;
    safety_policy.auto_approve_readonly = config.safety.auto_approve_readonly;
    safety_policy.require_approval_for_write = config.safety.require_approval_for_write;

    let tool_context = crate::tools::ToolExecutionContext {
        working_directory: std::env::current_dir().unwrap_or_default(),
        kubectl_context: crate::kubectl::KubectlContext::current().ok(),
    };

    let approval = Arc::new(InProcessApprovalChannel::new(crate::approval::DEFAULT_APPROVAL_TIMEOUT));
    let agent_loop = Arc::new(AgentLoop {
        provider,
        registry: Arc::new(registry),
        approval: approval.clone(),
        safety_policy,
        tool_context,
        max_turns: None,
    });

    Ok(DashboardState { agent_loop, sessions: Arc::new(SessionStore::new()), approval, event_channels: Mutex::new(HashMap::new()) })
}

fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id/turns", post(submit_turn))
        .route("/api/sessions/:id/events", get(session_events))
        .route("/api/sessions/:id/approvals/:request_id", post(submit_approval))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_sessions(State(state): State<Arc<DashboardState>>) -> Json<Vec<String>> {
    Json(state.sessions.session_ids())
}

async fn submit_turn(
    State(state): State<Arc<DashboardState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SubmitTurnRequest>,
) -> Json<SubmitTurnResponse> {
    let session = state.sessions.get_or_create(&session_id);
    let sender = state.event_sender(&session_id);
    let agent_loop = state.agent_loop.clone();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let _ = sender.send(event);
        }
    });

    tokio::spawn(async move {
        if let Err(e) = agent_loop.run_turn(&session, request.prompt, Some(tx)).await {
            tracing::warn!(error = %e, "agent turn failed");
        }
    });

    Json(SubmitTurnResponse { session_id, accepted: true })
}

async fn session_events(
    State(state): State<Arc<DashboardState>>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.event_sender(&session_id).subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => serde_json::to_string(&event).ok().map(|json| Ok(SseEvent::default().data(json))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn submit_approval(
    State(state): State<Arc<DashboardState>>,
    Path((_session_id, request_id)): Path<(String, String)>,
    Json(request): Json<ApprovalDecisionRequest>,
) -> impl IntoResponse {
    let decision = if request.approved { ApprovalDecision::Approved } else { ApprovalDecision::Denied };
    match state.approval.submit_decision(&request_id, decision) {
        Ok(()) => (axum::http::StatusCode::OK, "decision recorded").into_response(),
        Err(e) => (axum::http::StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}
