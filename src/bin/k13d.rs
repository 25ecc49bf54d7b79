// k13d CLI entry point.
//
// Usage:
//   k13d               # interactive TUI (default)
//   k13d tui           # same, explicit
//   k13d web --bind <addr>
//   k13d mcp           # MCP server over stdio, same binary as k13d-mcp
//   k13d agent <prompt>  # one-shot headless turn, auto-deciding approvals
//   k13d supervisor start|stop|status

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use tokio::sync::mpsc;

use k13d::agent::{AgentEvent, AgentLoop};
use k13d::approval::{ApprovalChannel, ApprovalDecision, ApprovalError, ApprovalRequest, AutoDecider, InProcessApprovalChannel, DEFAULT_APPROVAL_TIMEOUT};
use k13d::config::{Config, LlmProviderKind};
use k13d::kubectl::{EnvironmentType, KubectlContext, RiskLevel};
use k13d::llm::anthropic::AnthropicProvider;
use k13d::llm::embedded::EmbeddedProvider;
use k13d::llm::gemini::GeminiProvider;
use k13d::llm::ollama::OllamaProvider;
use k13d::llm::openai::OpenAiCompatibleProvider;
use k13d::llm::{AnyProvider, Provider, RetryingProvider};
use k13d::mcp::McpServer;
use k13d::safety::{SafetyClass, SafetyPolicy};
use k13d::session::SessionStore;
use k13d::supervisor::{Supervisor, SupervisorConfig, SupervisorError};
use k13d::tools::{ToolExecutionContext, ToolRegistry};
use k13d::ui::{create_layout, ConfirmationAction, ConfirmationModal, ConfirmationType, KaidoApp, ReasoningViewer, TerminalGuard};

#[derive(Parser)]
#[command(name = "k13d")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kubernetes management workstation with an agentic AI execution core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,
    /// Web dashboard
    Web {
        #[arg(long, default_value = "127.0.0.1:8088")]
        bind: String,
    },
    /// MCP server over stdio
    Mcp,
    /// Run a single headless turn, approving only read-only tool calls
    Agent {
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Manage the embedded LLM supervisor's child process
    Supervisor {
        #[command(subcommand)]
        action: SupervisorAction,
    },
}

#[derive(Subcommand)]
enum SupervisorAction {
    Start,
    Stop,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logging_guard = init_logging()?;

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_tui(config).await,
        Commands::Web { bind } => k13d::web::serve(config, &bind).await,
        Commands::Mcp => run_mcp(config).await,
        Commands::Agent { prompt } => run_agent_oneshot(config, prompt.join(" ")).await,
        Commands::Supervisor { action } => run_supervisor(config, action).await,
    }
}

/// Installs a `tracing` subscriber writing to `<data_dir>/logs/k13d.log`,
/// level controlled by `RUST_LOG` (default `k13d=info,warn`). Returns the
/// non-blocking writer's guard, which must stay alive for the process's
/// lifetime or buffered lines are dropped on exit.
fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = Config::data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::never(&log_dir, "k13d.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "k13d=info,warn".into()))
        .init();

    Ok(guard)
}

fn build_any_provider(config: &Config) -> AnyProvider {
    let llm = &config.llm;
    let endpoint = azure_aware_endpoint(llm);
    match llm.provider {
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
    }
}

/// Azure OpenAI's endpoint is resource-specific, not purely
/// region-based, but when a user hasn't set `llm.endpoint` explicitly
/// and has set `llm.region`, fall back to the regional Cognitive
/// Services gateway rather than dialing an empty URL.
fn azure_aware_endpoint(llm: &k13d::config::LlmConfig) -> String {
    if llm.provider == LlmProviderKind::Azure && llm.endpoint.is_empty() && !llm.region.is_empty() {
        format!("https://{}.api.cognitive.microsoft.com", llm.region)
    } else {
        llm.resolved_endpoint()
    }
}

fn build_provider(config: &Config) -> Arc<dyn Provider> {
    let base = build_any_provider(config);
    if config.llm.retry.enabled {
        Arc::new(
            RetryingProvider::with_policy(base, config.llm.retry.max_attempts, Duration::from_millis(250))
                .with_max_backoff(Duration::from_secs(config.llm.retry.max_backoff_secs)),
        )
    } else {
        Arc::new(base)
    }
}

async fn build_registry(config: &Config) -> anyhow::Result<Arc<ToolRegistry>> {
    let mut registry = ToolRegistry::with_defaults()?;
    if let Err(e) = k13d::mcp::connect_configured_servers(&config.mcp.servers, &mut registry).await {
        tracing::warn!(error = %e, "failed to connect one or more configured mcp servers");
    }
    Ok(Arc::new(registry))
}

fn build_safety_policy(config: &Config) -> anyhow::Result<SafetyPolicy> {
    let mut policy = SafetyPolicy::with_blocked_patterns(&config.safety.blocked_patterns)?;
    policy.block_dangerous = config.safety.block_dangerous;
    policy.auto_approve_readonly = config.safety.auto_approve_readonly;
    policy.require_approval_for_write = config.safety.require_approval_for_write;
    Ok(policy)
}

fn current_kubectl_context() -> Option<KubectlContext> {
    KubectlContext::current().ok()
}

fn tool_execution_context() -> ToolExecutionContext {
    ToolExecutionContext {
        working_directory: std::env::current_dir().unwrap_or_default(),
        kubectl_context: current_kubectl_context(),
    }
}

/// Maps a tool call's safety class onto the confirmation modal's risk
/// tiers: `ReadOnly` never prompts (handled upstream by the safety
/// policy), so only the three classes that can reach a human matter.
fn risk_level_for(class: SafetyClass) -> RiskLevel {
    match class {
        SafetyClass::ReadOnly => RiskLevel::Low,
        SafetyClass::Write | SafetyClass::Interactive => RiskLevel::Medium,
        SafetyClass::Dangerous => RiskLevel::High,
    }
}

/// Forwards approval requests to an [`InProcessApprovalChannel`] while
/// also publishing them on `notify`, so the TUI's main loop learns a
/// decision is pending without polling the channel's private state.
struct TuiApprovalChannel {
    inner: Arc<InProcessApprovalChannel>,
    notify: mpsc::UnboundedSender<ApprovalRequest>,
}

#[async_trait]
impl ApprovalChannel for TuiApprovalChannel {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision, ApprovalError> {
        let _ = self.notify.send(request.clone());
        self.inner.request_approval(request).await
    }
}

async fn run_agent_oneshot(config: Config, prompt: String) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("usage: k13d agent <prompt>");
    }

    let provider = build_provider(&config);
    let registry = build_registry(&config).await?;
    let safety_policy = build_safety_policy(&config)?;
    let loop_ = AgentLoop {
        provider,
        registry,
        approval: Arc::new(AutoDecider { auto_approve_read_only: config.safety.auto_approve_readonly }),
        safety_policy,
        tool_context: tool_execution_context(),
        max_turns: None,
    };

    let store = SessionStore::new();
    let session = store.get_or_create("agent-oneshot");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = loop_.run_turn(&session, prompt, Some(tx)).await;
    drop(printer.await);

    match result {
        Ok(content) => {
            println!("{content}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ToolCallProposed { call, safety_class, reason } => {
            eprintln!("[tool] {} ({safety_class}): {reason}", call.name);
        }
        AgentEvent::ToolCallDenied { call_id, reason } => {
            eprintln!("[denied] {call_id}: {reason}");
        }
        AgentEvent::ToolCallResult { call_id, is_error, .. } => {
            eprintln!("[result] {call_id} ({})", if *is_error { "error" } else { "ok" });
        }
        _ => {}
    }
}

async fn run_mcp(config: Config) -> anyhow::Result<()> {
    let registry = build_registry(&config).await?;
    let server = McpServer::new(registry, tool_execution_context());
    server.run().await
}

async fn run_supervisor(config: Config, action: SupervisorAction) -> anyhow::Result<()> {
    let data_dir = Config::data_dir()?;
    let bin_dir = data_dir.join("llm").join("bin");
    let binary_path = k13d::supervisor::ensure_binary(&bin_dir).await?;

    let model_path = if config.embedded_llm.model_path.as_os_str().is_empty() {
        return Err(SupervisorError::ModelMissing("embedded_llm.model_path is not configured".to_string()).into());
    } else {
        config.embedded_llm.model_path.clone()
    };

    let mut sup_config = SupervisorConfig::new(binary_path, model_path);
    sup_config.port = config.embedded_llm.port;
    sup_config.context_size = config.embedded_llm.context_size;
    sup_config.threads = config.embedded_llm.threads;
    sup_config.gpu_layers = config.embedded_llm.gpu_layers;
    sup_config.verbose = config.embedded_llm.verbose;

    let supervisor = Supervisor::new();
    match action {
        SupervisorAction::Start => {
            supervisor.start(&sup_config).await?;
            println!("embedded llm server listening on {}", supervisor.endpoint().unwrap_or_default());
        }
        SupervisorAction::Stop => {
            supervisor.stop().await;
            println!("embedded llm server stopped");
        }
        SupervisorAction::Status => {
            let status = supervisor.status(&sup_config);
            println!("{status:#?}");
        }
    }
    Ok(())
}

async fn run_tui(config: Config) -> anyhow::Result<()> {
    let provider = build_provider(&config);
    let registry = build_registry(&config).await?;
    let safety_policy = build_safety_policy(&config)?;
    let approval_inner = Arc::new(InProcessApprovalChannel::new(DEFAULT_APPROVAL_TIMEOUT));
    let (approval_notify_tx, mut approval_notify_rx) = mpsc::unbounded_channel();
    let approval: Arc<dyn ApprovalChannel> = Arc::new(TuiApprovalChannel { inner: approval_inner.clone(), notify: approval_notify_tx });

    let agent_loop = Arc::new(AgentLoop { provider, registry, approval, safety_policy, tool_context: tool_execution_context(), max_turns: None });
    let session_store = SessionStore::new();
    let session = session_store.get_or_create("tui");
    let environment = current_kubectl_context().map(|c| c.environment_type).unwrap_or(EnvironmentType::Unknown);

    let _terminal_guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = KaidoApp::new();
    let mut reasoning = ReasoningViewer::new();
    let mut pending_confirmation: Option<(ConfirmationModal, String)> = None;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let mut current_turn: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        if current_turn.as_ref().is_some_and(|h| h.is_finished()) {
            current_turn = None;
        }

        terminal.draw(|f| {
            let area = f.size();
            let (left, right) = create_layout(area, true);
            let right = right.unwrap_or(left);

            let input_block = Paragraph::new(Line::from(vec![Span::styled("> ", Style::default().fg(Color::Cyan)), Span::raw(app.input.as_str())]))
                .block(Block::default().borders(Borders::ALL).title("k13d"));
            let chunks = Layout::default().direction(Direction::Vertical).constraints([Constraint::Min(1), Constraint::Length(3)]).split(left);

            let output = Paragraph::new(app.output.as_str()).block(Block::default().borders(Borders::ALL).title("Output")).wrap(Wrap { trim: false });
            f.render_widget(output, chunks[0]);
            f.render_widget(input_block, chunks[1]);

            reasoning.render_compact(f, right);

            if let Some((modal, _)) = &pending_confirmation {
                modal.render(f, area);
            }
        })?;

        while let Ok(event) = event_rx.try_recv() {
            if let AgentEvent::TurnFinished { content } = &event {
                app.output = content.clone();
            }
            reasoning.push(event);
        }

        if let Ok(request) = approval_notify_rx.try_recv() {
            let risk = risk_level_for(request.safety_class);
            let modal = ConfirmationModal::new(request.command.clone(), risk, environment);
            if matches!(ConfirmationType::from_risk_and_environment(risk, environment), ConfirmationType::None) {
                let _ = approval_inner.submit_decision(&request.id, ApprovalDecision::Approved);
            } else {
                pending_confirmation = Some((modal, request.id));
            }
        }

        if event::poll(Duration::from_millis(80))? {
            if let Event::Key(key) = event::read()? {
                if let Some((modal, call_id)) = pending_confirmation.as_mut() {
                    if modal.handle_input(key.code) {
                        let decision = match modal.action {
                            ConfirmationAction::Confirmed => ApprovalDecision::Approved,
                            _ => ApprovalDecision::Denied,
                        };
                        let _ = approval_inner.submit_decision(call_id, decision);
                        pending_confirmation = None;
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Enter => {
                        if !app.input.is_empty() && current_turn.is_none() {
                            let prompt = app.input.clone();
                            app.add_to_history(prompt.clone());
                            app.clear_input();

                            let loop_ = agent_loop.clone();
                            let session = session.clone();
                            let tx = event_tx.clone();
                            current_turn = Some(tokio::spawn(async move {
                                let _ = loop_.run_turn(&session, prompt, Some(tx)).await;
                            }));
                        }
                    }
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Char(c) => {
                        app.input.push(c);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
