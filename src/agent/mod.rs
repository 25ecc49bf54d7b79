//! Agent Loop: the state machine that turns one user message into zero
//! or more provider round-trips, each possibly gated by the Safety
//! Analyzer and Approval Channel before a tool actually runs.
//!
//! Supersedes `agent_loop.rs`'s single-provider ReAct loop (kept on disk
//! during development as reference, removed in the final trim pass once
//! everything it covered has a home here).

pub mod engine;
pub mod state;

pub use engine::AgentLoop;
pub use state::{AgentEvent, AgentPhase};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] crate::llm::ProviderError),

    #[error(transparent)]
    Safety(#[from] crate::safety::SafetyError),

    #[error("tool registry error: {0}")]
    ToolRegistry(crate::tools::ToolRegistryError),

    #[error("turn exceeded its maximum duration")]
    TurnTimedOut,

    #[error("turn was cancelled")]
    Cancelled,
}
