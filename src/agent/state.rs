use serde::{Deserialize, Serialize};

/// The agent's state machine. Every turn starts at `Idle`, and ends at
/// `Done`, `Error`, or `Cancelled`; `ToolAnalysis` and
/// `WaitingForApproval` are entered per tool call within a turn, not
/// per turn.
///
/// Grounded on `src/agent/agent_loop.rs`'s `AgentStatus`
/// (`Running`/`Completed`/`AwaitingConfirmation`/`Failed`/`Stopped`),
/// split into a proper state machine with a distinct `ToolAnalysis`
/// phase for the moment between a provider returning tool calls and the
/// safety analyzer having classified them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    Idle,
    Running,
    ToolAnalysis,
    WaitingForApproval,
    Done,
    Cancelled,
    Error,
}

impl AgentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Running => "running",
            AgentPhase::ToolAnalysis => "tool_analysis",
            AgentPhase::WaitingForApproval => "waiting_for_approval",
            AgentPhase::Done => "done",
            AgentPhase::Cancelled => "cancelled",
            AgentPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted as a turn progresses, for any UI surface (TUI, web
/// SSE) that wants to render live progress rather than block until the
/// whole turn finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    PhaseChanged(AgentPhase),
    AssistantText(String),
    ToolCallProposed { call: crate::tools::ToolCall, safety_class: crate::safety::SafetyClass, reason: String },
    ToolCallDenied { call_id: String, reason: String },
    ToolCallResult { call_id: String, output: String, is_error: bool },
    TurnFinished { content: String },
}
